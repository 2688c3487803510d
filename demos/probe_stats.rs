use core::mem::MaybeUninit;

use clap::Parser;
use clap::ValueEnum;
use fixed_containers::BucketStatus;
use fixed_containers::Error;
use fixed_containers::HashTable;
use fixed_containers::UnsignedKeys;
use fixed_containers::hasher::default_key_hasher;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Keys {
    /// Identity hash over sequential integers
    Sequential,
    /// Identity hash over random integers
    Random,
    /// Default hash builder over random integers
    Hashed,
}

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "capacity", default_value_t = 1024)]
    capacity: usize,

    /// Target load factor in percent
    #[arg(short = 'l', long = "load", default_value_t = 90)]
    load: usize,

    /// Percentage of inserted keys to delete again afterwards
    #[arg(short = 'd', long = "delete", default_value_t = 0)]
    delete: usize,

    #[arg(short = 'k', long = "keys", value_enum, default_value_t = Keys::Hashed)]
    keys: Keys,

    #[arg(short = 's', long = "seed", default_value_t = 0)]
    seed: u64,
}

fn run<H: fixed_containers::KeyHasher<u64>>(args: &Args, hasher: H) {
    let mut keys = (0..args.capacity)
        .map(|_| MaybeUninit::uninit())
        .collect::<Vec<MaybeUninit<u64>>>();
    let mut values = (0..args.capacity)
        .map(|_| MaybeUninit::uninit())
        .collect::<Vec<MaybeUninit<u64>>>();
    let mut status = vec![BucketStatus::Empty; args.capacity];

    let mut table = match HashTable::new(&mut keys, &mut values, &mut status, hasher) {
        Ok(table) => table,
        Err(err) => {
            eprintln!("cannot create table: {err}");
            return;
        }
    };

    let target = args.capacity * args.load.min(100) / 100;
    let mut rng = SmallRng::seed_from_u64(args.seed);
    let mut inserted = Vec::with_capacity(target);
    let mut duplicates = 0;

    println!(
        "Filling table of capacity {} to {} entries ({:?} keys)...",
        args.capacity, target, args.keys
    );

    let mut next = 0u64;
    while table.len() < target {
        let key = match args.keys {
            Keys::Sequential => {
                next += 1;
                next - 1
            }
            Keys::Random | Keys::Hashed => rng.random(),
        };
        match table.insert(key, key.rotate_left(17)) {
            Ok(()) => inserted.push(key),
            Err(Error::DuplicateKey) => duplicates += 1,
            Err(err) => {
                eprintln!("insert failed: {err}");
                break;
            }
        }
    }

    let deletes = inserted.len() * args.delete.min(100) / 100;
    for _ in 0..deletes {
        let key = inserted.swap_remove(rng.random_range(0..inserted.len()));
        if let Err(err) = table.delete(&key) {
            eprintln!("delete of {key} failed: {err}");
        }
    }

    println!(
        "Inserted {} keys ({} duplicates skipped), deleted {}",
        inserted.len() + deletes,
        duplicates,
        deletes
    );

    let lost = inserted
        .iter()
        .filter(|key| table.search(key).is_err())
        .count();
    println!("Unreachable keys after deletion: {lost}");

    table.print_probe_histogram();
    table.debug_stats().print();
}

fn main() {
    let args = Args::parse();

    match args.keys {
        Keys::Sequential | Keys::Random => run(&args, UnsignedKeys),
        Keys::Hashed => run(&args, default_key_hasher()),
    }
}
