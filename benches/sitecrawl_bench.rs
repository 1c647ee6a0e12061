use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sitecrawl::content::HtmlProcessor;
use sitecrawl::found_url::{FoundUrlSet, SourceTag};
use sitecrawl::url_model::ParsedUrl;

fn bench_url_parse_relative(c: &mut Criterion) {
    let base = ParsedUrl::parse("https://example.com/docs/getting-started", None).unwrap();
    c.bench_function("parsed_url_relative_resolve", |b| {
        b.iter(|| black_box(ParsedUrl::parse("../assets/app.css", Some(black_box(&base))).unwrap()))
    });
}

fn bench_html_extract(c: &mut Criterion) {
    let source = ParsedUrl::parse("https://example.com/", None).unwrap();
    let html = r#"<!doctype html>
<html>
  <head><title>Bench Page</title><meta name="description" content="a page"></head>
  <body>
    <h1>Title</h1>
    <p>Hello <a href="/docs/intro">Intro</a></p>
    <ul><li><a href="/a">A</a></li><li><a href="/b">B</a></li></ul>
    <img src="/img1.png"><img srcset="/img2.png 1x, /img3.png 2x">
  </body>
</html>"#;

    c.bench_function("html_extract_urls_and_meta", |b| {
        b.iter(|| black_box(HtmlProcessor::extract(black_box(html.as_bytes()), black_box(&source))))
    });
}

fn bench_found_url_set_insert(c: &mut Criterion) {
    let source = ParsedUrl::parse("https://example.com/", None).unwrap();
    c.bench_function("found_url_set_insert_dedup", |b| {
        b.iter(|| {
            let mut set = FoundUrlSet::new();
            for i in 0..200 {
                set.insert(&format!("/page-{}", i % 50), &source, SourceTag::AHref);
            }
            black_box(set.len())
        })
    });
}

criterion_group!(benches, bench_url_parse_relative, bench_html_extract, bench_found_url_set_insert);
criterion_main!(benches);
