// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

use criterion::*;
use rand::{thread_rng, RngCore};

use xmss_signatures::merkle::MerkleTree;
use xmss_signatures::ots::OtsScheme;
use xmss_signatures::xmss::Xmss;

fn xmss_keygen(c: &mut Criterion) {
    c.bench_function("XMSS (WOTS w=4, h=4) KeyGen", |b| {
        b.iter(|| {
            let mut xmss = Xmss::new(OtsScheme::winternitz(4).unwrap(), 4);
            xmss.generate_keypair().unwrap();
        })
    });
}

fn xmss_sign(c: &mut Criterion) {
    let mut rng = thread_rng();
    let mut xmss = Xmss::new(OtsScheme::winternitz(4).unwrap(), 6);
    xmss.generate_keypair().unwrap();
    c.bench_function("XMSS (WOTS w=4, h=6) Sign", |b| {
        b.iter_batched(
            || {
                let n = rng.next_u32();
                format!("msg{}", n)
            },
            |m| {
                let sig = xmss.sign(m.as_bytes()).unwrap();
                // Rewind so the bench never exhausts the keypair.
                xmss.update_state(0);
                sig
            },
            BatchSize::SmallInput,
        )
    });
}

fn xmss_verify(c: &mut Criterion) {
    let mut xmss = Xmss::new(OtsScheme::winternitz(4).unwrap(), 6);
    xmss.generate_keypair().unwrap();
    let pk = xmss.get_public_key().unwrap().clone();
    let sig = xmss.sign(b"benchmark message").unwrap();
    c.bench_function("XMSS (WOTS w=4, h=6) Verify", |b| {
        b.iter(|| xmss.verify(b"benchmark message", &sig, &pk))
    });
}

fn target_sum_sign(c: &mut Criterion) {
    let mut rng = thread_rng();
    let mut xmss = Xmss::new(OtsScheme::target_sum(4).unwrap(), 6);
    xmss.generate_keypair().unwrap();
    c.bench_function("XMSS (target-sum w=4, h=6) Sign", |b| {
        b.iter_batched(
            || {
                let n = rng.next_u32();
                format!("msg{}", n)
            },
            |m| {
                let sig = xmss.sign(m.as_bytes()).unwrap();
                xmss.update_state(0);
                sig
            },
            BatchSize::SmallInput,
        )
    });
}

fn merkle_build(c: &mut Criterion) {
    let leaves: Vec<Vec<u8>> = (0..1024u32).map(|i| i.to_be_bytes().to_vec()).collect();
    c.bench_function("Merkle Tree Build (1024 leaves)", |b| {
        b.iter_batched(
            || leaves.clone(),
            |l| MerkleTree::<sha2::Sha256>::new(l).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    xmss_keygen,
    xmss_sign,
    xmss_verify,
    target_sum_sign,
    merkle_build
);
criterion_main!(benches);
