use geoip::{Database, LoadMode, OpenOptions, TableDatabase};

fn main() -> Result<(), String> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .ok_or("First argument must be the path to the IP database")?;
    let addr = args
        .next()
        .ok_or("Second argument must be the IP address, like 24.24.24.24")?;
    let mode: LoadMode = match args.next() {
        Some(mode) => mode.parse().map_err(|e| format!("{e}"))?,
        None => LoadMode::default(),
    };

    let db = Database::<TableDatabase>::open(&path, &OpenOptions::default().mode(mode))
        .map_err(|e| format!("{path}: {e}"))?;
    match db.look_up(&addr).map_err(|e| format!("{addr}: {e}"))? {
        Some(result) => {
            for (key, value) in result.iter() {
                println!("{key}: {value:?}");
            }
        }
        None => println!("{addr}: not found in {} database", db.edition()),
    }
    if let Ok(num) = geoip::addr_to_num(&addr) {
        println!("numeric: {num}");
    }
    Ok(())
}
