//! Demo harness: builds an index over random keys, plants a probe key, and
//! prints the exhaustive lower-bound position next to the index's predicted
//! and resolved positions.
//!
//! Usage: `histree_demo [count] [--dump]`

use std::collections::BTreeSet;
use std::env;

use histree_rs::HistogramTree;
use rand::Rng;

const DEFAULT_COUNT: usize = 199;
const PROBE_KEY: i32 = 999_999;

fn main() {
    let mut count = DEFAULT_COUNT;
    let mut dump = false;
    for arg in env::args().skip(1) {
        if arg == "--dump" {
            dump = true;
        } else if let Ok(n) = arg.parse::<usize>() {
            count = n.clamp(1, 1_000_000);
        } else {
            eprintln!("usage: histree_demo [count] [--dump]");
            std::process::exit(2);
        }
    }

    let mut rng = rand::thread_rng();
    let mut keys: BTreeSet<i32> = BTreeSet::new();
    while keys.len() < count {
        keys.insert(rng.gen_range(0..count as i32 * 100));
    }
    keys.insert(PROBE_KEY);
    let data: Vec<i32> = keys.into_iter().collect();

    let tree = HistogramTree::new(data.clone());
    println!(
        "{} keys in [{}, {}], {} bins per node",
        tree.len(),
        tree.min(),
        tree.max(),
        tree.bins()
    );

    let real = data.partition_point(|&k| k < PROBE_KEY);
    println!("real pos:    {real}");
    println!("predict pos: {}", tree.lookup_predict(PROBE_KEY));
    println!("lookup pos:  {}", tree.lookup(PROBE_KEY));

    if dump {
        print!("{}", tree.dump());
    }
}
