use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tn3270r::address::AddressMode;
use tn3270r::parser::{Event, EventSink, ParserConfig, StreamParser};

#[derive(Default)]
struct Sink(usize);
impl EventSink for Sink {
    fn event(&mut self, event: Event) {
        if matches!(event, Event::Order(_) | Event::Data(_)) {
            self.0 += 1;
        }
    }
}

fn erase_write_hello() -> Vec<u8> {
    vec![0xF5, 0xC3, 0x11, 0x40, 0x40, 0xC8, 0xC5, 0xD3, 0xD3, 0xD6]
}

fn bench_parse_erase_write(c: &mut Criterion) {
    let data = erase_write_hello();
    c.bench_function("stream_parser_erase_write_hello", |b| {
        b.iter(|| {
            let mut parser = StreamParser::new(AddressMode::TwelveBit, 1920, ParserConfig::default());
            let mut sink = Sink::default();
            parser.feed(black_box(&data), &mut sink).unwrap();
            parser.end_record(&mut sink);
            black_box(sink.0)
        })
    });
}

fn bench_parse_byte_at_a_time(c: &mut Criterion) {
    let data = erase_write_hello();
    c.bench_function("stream_parser_byte_at_a_time", |b| {
        b.iter(|| {
            let mut parser = StreamParser::new(AddressMode::TwelveBit, 1920, ParserConfig::default());
            let mut sink = Sink::default();
            for &byte in &data {
                parser.feed(black_box(&[byte]), &mut sink).unwrap();
            }
            parser.end_record(&mut sink);
            black_box(sink.0)
        })
    });
}

criterion_group!(benches, bench_parse_erase_write, bench_parse_byte_at_a_time);
criterion_main!(benches);
