use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgba, RgbaImage};
use shotnote::rendering::font::BitmapFont;
use shotnote::rendering::layout::layout_callout;
use shotnote::{
    Annotation, AnnotationKind, AnnotationSurface, ImageSource, SurfaceConfig, Viewport,
};
use std::io::Cursor;

fn scene() -> Vec<Annotation> {
    (0..10)
        .map(|i| {
            Annotation::new(
                format!("b{}", i),
                60.0 + 110.0 * i as f32,
                80.0 + 70.0 * (i % 8) as f32,
                "Text is hard to read against this background image",
                AnnotationKind::ALL[i % 3],
            )
        })
        .collect()
}

fn base_png() -> Vec<u8> {
    let img = RgbaImage::from_fn(640, 400, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 90, 255])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).expect("encode png");
    out.into_inner()
}

fn bench_full_render(c: &mut Criterion) {
    let mut surface = AnnotationSurface::new(SurfaceConfig {
        viewport: Viewport { width: 1280, height: 800 },
        ..Default::default()
    });
    surface.load(&ImageSource::Bytes(base_png()));
    let annotations = scene();

    c.bench_function("render_ten_callouts", |b| {
        b.iter(|| {
            surface.clear();
            surface.insert_annotations(annotations.clone()).unwrap();
        })
    });

    c.bench_function("snapshot_png", |b| {
        b.iter(|| black_box(surface.snapshot().unwrap()))
    });
}

fn bench_layout(c: &mut Criterion) {
    let font = BitmapFont::new();
    let annotations = scene();
    c.bench_function("layout_ten_callouts", |b| {
        b.iter(|| {
            for a in &annotations {
                black_box(layout_callout(a, 1280.0, 800.0, &font));
            }
        })
    });
}

criterion_group!(benches, bench_full_render, bench_layout);
criterion_main!(benches);
