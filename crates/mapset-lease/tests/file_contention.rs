//! Many services on one lease directory racing for the same expired key.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use mapset_lease::{FileLeaseService, LeaseService};
use mapset_types::{LeaseKey, LocationName, MapsetName, UserGroup};
use tempfile::TempDir;

const CONTENDERS: usize = 16;
const ROUNDS: usize = 200;
const TTL: Duration = Duration::from_secs(600);

fn key(round: usize) -> LeaseKey {
    LeaseKey::derive(
        &UserGroup::new("group").unwrap(),
        &LocationName::new("loc").unwrap(),
        &MapsetName::new(format!("m{round}")).unwrap(),
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

#[test]
fn one_winner_when_an_expired_lease_is_reclaimed_concurrently() {
    let dir = TempDir::new().unwrap();
    let seed = FileLeaseService::open(dir.path()).unwrap();
    let services: Vec<FileLeaseService> = (0..CONTENDERS)
        .map(|_| FileLeaseService::open(dir.path()).unwrap())
        .collect();

    for round in 0..ROUNDS {
        let key = key(round);
        assert!(runtime().block_on(seed.lock(&key, Duration::ZERO)).unwrap());

        let barrier = Arc::new(Barrier::new(CONTENDERS));
        let threads: Vec<_> = services
            .iter()
            .cloned()
            .map(|service| {
                let barrier = barrier.clone();
                let key = key.clone();
                thread::spawn(move || {
                    let rt = runtime();
                    barrier.wait();
                    let won = rt.block_on(service.lock(&key, TTL)).unwrap();
                    (service.holder(), won)
                })
            })
            .collect();

        let winners: Vec<_> = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|(_, won)| *won)
            .map(|(holder, _)| holder)
            .collect();

        assert_eq!(winners.len(), 1, "round {round}: winners {winners:?}");
        let record = seed.read(&key).unwrap().expect("live lease");
        assert_eq!(record.holder, winners[0], "round {round}");
    }
}

#[test]
fn release_and_relock_never_overlap() {
    let dir = TempDir::new().unwrap();
    let key = key(0);
    let services: Vec<FileLeaseService> = (0..CONTENDERS)
        .map(|_| FileLeaseService::open(dir.path()).unwrap())
        .collect();
    let barrier = Arc::new(Barrier::new(CONTENDERS));

    let threads: Vec<_> = services
        .into_iter()
        .map(|service| {
            let barrier = barrier.clone();
            let key = key.clone();
            thread::spawn(move || {
                let rt = runtime();
                barrier.wait();
                let mut held = 0;
                for _ in 0..50 {
                    if rt.block_on(service.lock(&key, TTL)).unwrap() {
                        let record = service.read(&key).unwrap().expect("own lease");
                        assert_eq!(record.holder, service.holder());
                        assert!(rt.block_on(service.extend(&key, TTL)).unwrap());
                        rt.block_on(service.unlock(&key)).unwrap();
                        held += 1;
                    }
                }
                held
            })
        })
        .collect();

    let total: usize = threads.into_iter().map(|t| t.join().unwrap()).sum();
    assert!(total > 0);
}
