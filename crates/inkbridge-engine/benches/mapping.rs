use criterion::{Criterion, criterion_group, criterion_main};
use inkbridge_engine::model::node;
use inkbridge_engine::{Editable, EditableOptions, Node, NodeRef, Point};

fn generate_document(blocks: usize) -> Vec<NodeRef> {
    (0..blocks)
        .map(|index| {
            if index % 10 == 9 {
                Node::void("image")
            } else {
                Node::element(
                    "paragraph",
                    vec![
                        Node::text(format!("Paragraph {index} with some ")),
                        Node::marked("bold", ["bold"]),
                        Node::text(" content."),
                    ],
                )
            }
        })
        .collect()
}

fn bench_mapping(c: &mut Criterion) {
    let mut group = c.benchmark_group("mapping");
    group.sample_size(10);

    let editable = Editable::new(generate_document(200), EditableOptions::default());
    let points: Vec<Point> = node::texts(editable.editor().root())
        .into_iter()
        .map(|(path, text)| {
            let len = text.as_text().map_or(0, |t| t.len());
            Point::new(path, len / 2)
        })
        .collect();

    group.bench_function("to_surface_point", |b| {
        b.iter(|| {
            editable.with_mapper(|mapper| {
                for point in &points {
                    let position = mapper.to_surface_point(std::hint::black_box(point));
                    std::hint::black_box(position.ok());
                }
            });
        });
    });

    group.bench_function("round_trip", |b| {
        b.iter(|| {
            editable.with_mapper(|mapper| {
                for point in &points {
                    let back = mapper
                        .to_surface_point(point)
                        .and_then(|position| mapper.to_model_point(&position));
                    std::hint::black_box(back.ok());
                }
            });
        });
    });

    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    group.sample_size(10);

    group.bench_function("render_200_blocks", |b| {
        b.iter(|| {
            let editable = Editable::new(generate_document(200), EditableOptions::default());
            std::hint::black_box(editable.registry().len());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_mapping, bench_render);
criterion_main!(benches);
