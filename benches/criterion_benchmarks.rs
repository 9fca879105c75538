use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use autograd::nn::{sum_squared_error, MlpParams};
use autograd::Graph;

fn forward_chain(c: &mut Criterion) {
  let mut group = c.benchmark_group("scalar/forward_chain");

  for chain_len in [10, 50, 100, 500, 1000] {
    group.throughput(Throughput::Elements(chain_len as u64));
    group.bench_with_input(
      BenchmarkId::from_parameter(chain_len),
      &chain_len,
      |b, &len| {
        let mut graph = Graph::with_capacity(8 * len);
        b.iter(|| {
          let out = {
            let mut x = graph.leaf(black_box(0.5));
            for _ in 0..len {
              x = (x * x + 1.0).tanh();
            }
            x.data()
          };
          graph.clear();
          black_box(out)
        });
      },
    );
  }
  group.finish();
}

fn backward_chain(c: &mut Criterion) {
  let mut group = c.benchmark_group("scalar/backward_chain");

  for chain_len in [10, 50, 100, 500, 1000] {
    group.throughput(Throughput::Elements(chain_len as u64));
    group.bench_with_input(
      BenchmarkId::from_parameter(chain_len),
      &chain_len,
      |b, &len| {
        let mut graph = Graph::with_capacity(8 * len);
        b.iter(|| {
          let grad = {
            let x = graph.leaf(black_box(0.5));
            let mut result = x;
            for _ in 0..len {
              result = (result * result + 1.0).tanh();
            }
            result.backward();
            x.grad()
          };
          graph.clear();
          black_box(grad)
        });
      },
    );
  }
  group.finish();
}

fn backward_fan_in(c: &mut Criterion) {
  let mut group = c.benchmark_group("scalar/backward_fan_in");

  // one leaf shared by every term of a long sum
  for width in [10, 100, 1000] {
    group.throughput(Throughput::Elements(width as u64));
    group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
      let mut graph = Graph::with_capacity(8 * width);
      b.iter(|| {
        let grad = {
          let x = graph.leaf(black_box(0.3));
          let mut sum = graph.leaf(0.0);
          for i in 0..width {
            sum = sum + (x * i as f64).exp();
          }
          sum.backward();
          x.grad()
        };
        graph.clear();
        black_box(grad)
      });
    });
  }
  group.finish();
}

fn mlp_step(c: &mut Criterion) {
  let mut group = c.benchmark_group("nn/mlp_step");

  group.bench_function("3-4-4-1", |b| {
    let inputs = [[2.0, 3.0, -1.0], [3.0, -1.0, 0.5], [0.5, 1.0, 1.0], [1.0, 1.0, -1.0]];
    let targets = [1.0, -1.0, -1.0, 1.0];
    let mut k = 0.0_f64;
    let mut params = MlpParams::new(3, &[4, 4, 1], || {
      k += 0.37;
      k.sin()
    });
    let mut graph = Graph::with_capacity(512);
    b.iter(|| {
      let loss = {
        let net = params.bind(&graph);
        let predictions: Vec<_> = inputs
          .iter()
          .map(|x| net.forward(x).map(|out| out[0]))
          .collect::<autograd::Result<_>>()
          .unwrap();
        let loss = sum_squared_error(&graph, &predictions, &targets).unwrap();
        loss.backward();
        params.step(&net, 0.01).unwrap();
        loss.data()
      };
      graph.clear();
      black_box(loss)
    });
  });

  group.finish();
}

criterion_group!(
  benches,
  forward_chain,
  backward_chain,
  backward_fan_in,
  mlp_step
);
criterion_main!(benches);
