//! End-to-end tests across the TensorMesh crates: multi-rank sharded
//! evaluation on real threads, the tensor-parallel MLP pattern, quantized
//! sharded blocks, and checkpoint round-trips.

use std::sync::Arc;
use std::thread;

use tensormesh::prelude::*;

/// One mesh handle per rank, all connected to the same in-process world.
fn mesh_world(k: usize) -> Vec<DeviceMesh> {
    ThreadBackend::create_world(k)
        .into_iter()
        .map(|backend| DeviceMesh::new(CommGroup::new(Arc::new(backend))))
        .collect()
}

/// Integer-valued test data keeps f32 arithmetic exact, so sharded and
/// unsharded results can be compared with strict equality.
fn pattern(shape: &[usize], modulo: i32) -> Tensor<f32> {
    let numel: usize = shape.iter().product();
    let data: Vec<f32> = (0..numel)
        .map(|i| ((i as i32 * 31 + 7) % modulo - modulo / 2) as f32)
        .collect();
    Tensor::from_vec(data, shape).unwrap()
}

fn assert_close(a: &Tensor<f32>, b: &Tensor<f32>, rtol: f32, atol: f32) {
    assert_eq!(a.shape(), b.shape());
    for (i, (x, y)) in a.as_slice().iter().zip(b.as_slice()).enumerate() {
        let tol = atol + rtol * y.abs();
        assert!((x - y).abs() <= tol, "index {i}: {x} vs {y} (tol {tol})");
    }
}

// =============================================================================
// ShardedToAll Correctness
// =============================================================================

#[test]
fn sharded_to_all_reproduces_full_matmul_on_every_rank() {
    let w = pattern(&[3, 8], 7);
    let x = pattern(&[2, 8], 5);
    let reference = Linear::from_weights(w.clone(), None)
        .unwrap()
        .forward(&x)
        .unwrap();

    for k in [1usize, 2, 4] {
        let handles: Vec<_> = mesh_world(k)
            .into_iter()
            .map(|mesh| {
                let w = w.clone();
                let x = x.clone();
                thread::spawn(move || {
                    let layer = ShardedToAllLinear::from_full_weights(w, None, &mesh).unwrap();
                    let (start, len) = layer.shard_spec().local_slice(8);
                    let x_local = x.narrow(1, start, len).unwrap();
                    layer.forward(&x_local).unwrap()
                })
            })
            .collect();

        for handle in handles {
            // The reduced result is replicated identically on every rank.
            assert_eq!(handle.join().unwrap().to_vec(), reference.to_vec(), "k={k}");
        }
    }
}

#[test]
fn sharded_to_all_handles_uneven_input_axis() {
    // 10 input features over 3 ranks: slices of {3, 3, 4}.
    let w = pattern(&[4, 10], 9);
    let x = pattern(&[2, 10], 5);
    let reference = Linear::from_weights(w.clone(), None)
        .unwrap()
        .forward(&x)
        .unwrap();

    let handles: Vec<_> = mesh_world(3)
        .into_iter()
        .map(|mesh| {
            let w = w.clone();
            let x = x.clone();
            thread::spawn(move || {
                let layer = ShardedToAllLinear::from_full_weights(w, None, &mesh).unwrap();
                let (start, len) = layer.shard_spec().local_slice(10);
                assert_eq!(len, if layer.shard_spec().local_rank == 2 { 4 } else { 3 });
                let x_local = x.narrow(1, start, len).unwrap();
                layer.forward(&x_local).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().to_vec(), reference.to_vec());
    }
}

// =============================================================================
// Tensor-Parallel MLP Pattern
// =============================================================================

#[test]
fn tensor_parallel_mlp_matches_unsharded() {
    let hidden = 12usize;
    let w1 = pattern(&[12, 6], 5);
    let b1 = pattern(&[12], 3);
    let w2 = pattern(&[5, 12], 7);
    let b2 = pattern(&[5], 3);
    let x = pattern(&[3, 6], 4);

    let reference = Sequential::new()
        .add(Linear::from_weights(w1.clone(), Some(b1.clone())).unwrap())
        .add(Linear::from_weights(w2.clone(), Some(b2.clone())).unwrap())
        .forward(&x)
        .unwrap();

    for k in [1usize, 2, 4] {
        assert_eq!(hidden % k, 0);
        let handles: Vec<_> = mesh_world(k)
            .into_iter()
            .map(|mesh| {
                let (w1, b1, w2, b2, x) =
                    (w1.clone(), b1.clone(), w2.clone(), b2.clone(), x.clone());
                thread::spawn(move || {
                    // Column-sharded then row-sharded: the intermediate
                    // stays sharded, one all-reduce total.
                    let model = Sequential::new()
                        .add(
                            AllToShardedLinear::from_full_weights(w1, Some(b1), &mesh).unwrap(),
                        )
                        .add(
                            ShardedToAllLinear::from_full_weights(w2, Some(b2), &mesh).unwrap(),
                        );
                    model.forward(&x).unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().to_vec(), reference.to_vec(), "k={k}");
        }
    }
}

#[test]
fn tensor_parallel_mlp_with_uneven_hidden_width() {
    // hidden = 10 over 3 ranks; the two layers slice the hidden axis with
    // the same remainder policy, so the chain stays consistent.
    let w1 = pattern(&[10, 4], 5);
    let w2 = pattern(&[3, 10], 7);
    let x = pattern(&[2, 4], 4);

    let reference = Sequential::new()
        .add(Linear::from_weights(w1.clone(), None).unwrap())
        .add(Linear::from_weights(w2.clone(), None).unwrap())
        .forward(&x)
        .unwrap();

    let handles: Vec<_> = mesh_world(3)
        .into_iter()
        .map(|mesh| {
            let (w1, w2, x) = (w1.clone(), w2.clone(), x.clone());
            thread::spawn(move || {
                let model = Sequential::new()
                    .add(AllToShardedLinear::from_full_weights(w1, None, &mesh).unwrap())
                    .add(ShardedToAllLinear::from_full_weights(w2, None, &mesh).unwrap());
                model.forward(&x).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().to_vec(), reference.to_vec());
    }
}

// =============================================================================
// AllToSharded Output Reassembly
// =============================================================================

#[test]
fn join_outputs_reassembles_replicated_result() {
    let w = pattern(&[8, 4], 5);
    let b = pattern(&[8], 3);
    let x = pattern(&[2, 4], 4);

    let reference = Linear::from_weights(w.clone(), Some(b.clone()))
        .unwrap()
        .forward(&x)
        .unwrap();

    let handles: Vec<_> = mesh_world(2)
        .into_iter()
        .map(|mesh| {
            let (w, b, x) = (w.clone(), b.clone(), x.clone());
            thread::spawn(move || {
                let layer =
                    AllToShardedLinear::from_full_weights(w, Some(b), &mesh).unwrap();
                let local = layer.forward(&x).unwrap();
                layer.join_outputs(&local).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().to_vec(), reference.to_vec());
    }
}

// =============================================================================
// Quantized Tensor-Parallel Block
// =============================================================================

#[test]
fn quantized_mlp_tracks_dense_reference() {
    let w1 = pattern(&[16, 8], 5).mul_scalar(0.25);
    let w2 = pattern(&[4, 16], 7).mul_scalar(0.25);
    let x = pattern(&[2, 8], 4).mul_scalar(0.5);

    let reference = Sequential::new()
        .add(Linear::from_weights(w1.clone(), None).unwrap())
        .add(Linear::from_weights(w2.clone(), None).unwrap())
        .forward(&x)
        .unwrap();

    for k in [1usize, 2] {
        let handles: Vec<_> = mesh_world(k)
            .into_iter()
            .map(|mesh| {
                let (w1, w2, x) = (w1.clone(), w2.clone(), x.clone());
                thread::spawn(move || {
                    let model = Sequential::new()
                        .add(
                            QuantizedAllToShardedLinear::from_full_weights(
                                w1, None, 8, 4, &mesh,
                            )
                            .unwrap(),
                        )
                        .add(
                            QuantizedShardedToAllLinear::from_full_weights(
                                w2, None, 8, 4, &mesh,
                            )
                            .unwrap(),
                        );
                    model.forward(&x).unwrap()
                })
            })
            .collect();

        for handle in handles {
            let got = handle.join().unwrap();
            assert_close(&got, &reference, 0.02, 0.5);
        }
    }
}

// =============================================================================
// Checkpoint Round-Trips
// =============================================================================

#[test]
fn quantized_checkpoint_roundtrip_is_byte_identical() {
    let w = pattern(&[4, 16], 11).mul_scalar(0.125);
    let model = Sequential::new()
        .add(QuantizedLinear::from_weights(w, None, 4, 8).unwrap());

    let state = model.state_dict();
    let json = tensormesh::serialize::to_json(&state).unwrap();
    let reloaded = tensormesh::serialize::from_json(&json).unwrap();

    // Load into an identically configured fresh model; the matching
    // layout must be adopted verbatim.
    let mut fresh = Sequential::new()
        .add(QuantizedLinear::new(16, 4, false, 4, 8).unwrap());
    let report = fresh.load_state(&reloaded);
    assert!(report.is_complete(), "failures: {:?}", report.failures);

    // save -> load -> save preserves the packed codes byte for byte.
    let resaved = fresh.state_dict();
    match (state.get("0.weight").unwrap(), resaved.get("0.weight").unwrap()) {
        (
            StateEntry::Quantized { packed: a, .. },
            StateEntry::Quantized { packed: b, .. },
        ) => assert_eq!(a, b),
        _ => panic!("weight entries must stay quantized"),
    }
    assert_eq!(state, resaved);
}

#[test]
fn dense_checkpoint_loads_into_quantized_model() {
    let w = pattern(&[4, 16], 9).mul_scalar(0.125);
    let dense = Sequential::new().add(Linear::from_weights(w.clone(), None).unwrap());

    let mut quantized = Sequential::new()
        .add(QuantizedLinear::new(16, 4, false, 8, 8).unwrap());
    let report = quantized.load_state(&dense.state_dict());
    assert!(report.is_complete(), "failures: {:?}", report.failures);

    let x = pattern(&[2, 16], 4).mul_scalar(0.25);
    let got = quantized.forward(&x).unwrap();
    let expected = dense.forward(&x).unwrap();
    assert_close(&got, &expected, 0.02, 0.5);
}
