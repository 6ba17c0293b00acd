#[macro_use]
extern crate criterion;
extern crate fake;
extern crate geoip;
extern crate rayon;

mod common;

use criterion::Criterion;
use fake::faker::internet::raw::IPv4;
use fake::locales::EN;
use fake::Fake;
use geoip::{Database, OpenOptions, TableDatabase};
use rayon::prelude::*;

// Generate `count` dotted-quad addresses
#[must_use]
pub fn generate_addrs(count: u64) -> Vec<String> {
    (0..count).map(|_| IPv4(EN).fake::<String>()).collect()
}

pub fn bench_addr_to_num(addrs: &[String]) {
    for addr in addrs.iter() {
        let _ = geoip::addr_to_num(addr);
    }
}

pub fn bench_num_to_addr(nums: &[u32]) {
    for num in nums.iter() {
        let _ = geoip::num_to_addr(u64::from(*num));
    }
}

// Single-threaded
pub fn bench_look_up(addrs: &[String], db: &Database<TableDatabase>) {
    for addr in addrs.iter() {
        let _ = db.look_up(addr);
    }
}

// Using rayon for parallel execution
pub fn bench_par_look_up(addrs: &[String], db: &Database<TableDatabase>) {
    addrs.par_iter().for_each(|addr| {
        let _ = db.look_up(addr);
    });
}

const DB_FILE: &str = "test-data/GeoLiteCity-Test.json";

pub fn criterion_codec_benchmark(c: &mut Criterion) {
    let addrs = generate_addrs(1000);
    let nums: Vec<u32> = common::generate_ipv4(1000)
        .into_iter()
        .map(|ip| ip.to_u32())
        .collect();

    c.bench_function("addr_to_num", |b| b.iter(|| bench_addr_to_num(&addrs)));
    c.bench_function("num_to_addr", |b| b.iter(|| bench_num_to_addr(&nums)));
}

pub fn criterion_look_up_benchmark(c: &mut Criterion) {
    let addrs: Vec<String> = common::generate_ipv4(100)
        .into_iter()
        .map(|ip| ip.to_string())
        .collect();
    let db = Database::<TableDatabase>::open(DB_FILE, &OpenOptions::default()).unwrap();

    c.bench_function("look_up", |b| b.iter(|| bench_look_up(&addrs, &db)));
    c.bench_function("look_up_par", |b| {
        b.iter(|| bench_par_look_up(&addrs, &db))
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .sample_size(10);

    targets = criterion_codec_benchmark, criterion_look_up_benchmark
}
criterion_main!(benches);
