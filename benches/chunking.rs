use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use staywise::chunking::{DEFAULT_CHUNK_OVERLAP, DEFAULT_MAX_CHUNK_CHARS, chunk_text};

fn property_guide(paragraphs: usize) -> String {
    let mut text = String::new();
    for i in 0..paragraphs {
        text.push_str(&format!(
            "Section {i}: The apartment is located on the third floor and the elevator \
             code is {i}{i}{i}. Checkout time is 11am and the keys go in the lockbox by \
             the front door. The air conditioning remote lives in the top kitchen drawer.\n\n"
        ));
    }
    text
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let text = property_guide(200);
    c.bench_function("chunking", |b| {
        b.iter(|| {
            chunk_text(
                black_box(&text),
                black_box(DEFAULT_MAX_CHUNK_CHARS),
                black_box(DEFAULT_CHUNK_OVERLAP),
            )
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
