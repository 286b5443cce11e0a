use criterion::{black_box, criterion_group, criterion_main, Criterion};

use arzip::ecc::codeword::{decode, encode};
use arzip::ecc::gf::{KK, NN};

fn bench_codeword(c: &mut Criterion) {
    let mut base = [0u8; NN];
    for (i, byte) in base[..KK].iter_mut().enumerate() {
        *byte = (i as u8).wrapping_mul(37).wrapping_add(11);
    }
    encode(&mut base);

    c.bench_function("rs_encode_codeword", |b| {
        b.iter(|| {
            let mut cw = base;
            encode(black_box(&mut cw));
            cw
        })
    });

    c.bench_function("rs_decode_clean_codeword", |b| {
        b.iter(|| {
            let mut cw = base;
            decode(black_box(&mut cw))
        })
    });

    c.bench_function("rs_decode_8_errors", |b| {
        b.iter(|| {
            let mut cw = base;
            for e in 0..8 {
                cw[e * 30] ^= 0x77;
            }
            decode(black_box(&mut cw))
        })
    });
}

criterion_group!(benches, bench_codeword);
criterion_main!(benches);
