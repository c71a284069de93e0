#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use burn::tensor::{Distribution, Tensor};
    use hmlstm::cells::LayerState;
    use hmlstm::rnn::Hmlstm;

    type Backend = NdArray<f32>;

    fn values(t: Tensor<Backend, 2>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_empty_sequence_keeps_initial_state() {
        let device = Default::default();
        let rnn = Hmlstm::<Backend>::new(3, &[4, 5], &device).unwrap();

        let initial = vec![
            LayerState::new(
                Tensor::ones([2, 4], &device),
                Tensor::ones([2, 4], &device).mul_scalar(0.5),
                Tensor::zeros([2, 1], &device),
            ),
            LayerState::zeros(2, 5, &device),
        ];
        let out = rnn.forward(Tensor::zeros([0, 2, 3], &device), Some(initial.clone()));

        assert!(out.is_empty());
        assert!(out.boundaries.is_empty());
        assert_eq!(out.boundaries.as_array().dim(), (2, 2, 0));
        assert_eq!(values(out.final_states[0].cell.clone()), values(initial[0].cell.clone()));
        assert_eq!(values(out.final_states[0].hidden.clone()), values(initial[0].hidden.clone()));
    }

    #[test]
    fn test_forward_is_deterministic() {
        let device = Default::default();
        let rnn = Hmlstm::<Backend>::new(3, &[4, 4], &device).unwrap();
        let input = Tensor::<Backend, 3>::random([6, 2, 3], Distribution::Default, &device);

        let a = rnn.forward(input.clone(), None);
        let b = rnn.forward(input, None);

        assert_eq!(a.boundaries, b.boundaries);
        assert_eq!(values(a.final_hidden_concat()), values(b.final_hidden_concat()));
    }

    #[test]
    fn test_trace_is_binary_for_large_inputs() {
        let device = Default::default();
        let rnn = Hmlstm::<Backend>::new(3, &[8, 8, 8], &device)
            .unwrap()
            .with_slope(4.0);
        let input =
            Tensor::<Backend, 3>::random([20, 3, 3], Distribution::Uniform(-100.0, 100.0), &device);

        let out = rnn.forward(input, None);

        assert_eq!(out.boundaries.as_array().dim(), (3, 3, 20));
        assert!(out.boundaries.is_binary());
        for layer in 0..3 {
            let rate = out.boundaries.boundary_rate(layer);
            assert!((0.0..=1.0).contains(&rate));
        }
    }

    #[test]
    fn test_batch_first_matches_sequence_first() {
        let device = Default::default();
        let rnn = Hmlstm::<Backend>::new(3, &[4], &device).unwrap();
        let seq_first = Tensor::<Backend, 3>::random([5, 2, 3], Distribution::Default, &device);
        let batch_first = seq_first.clone().swap_dims(0, 1);

        let a = rnn.forward(seq_first, None);
        let b = rnn.clone().with_batch_first(true).forward(batch_first, None);

        assert_eq!(a.boundaries, b.boundaries);
        assert_eq!(values(a.final_hidden_concat()), values(b.final_hidden_concat()));
    }

    #[test]
    fn test_render_prints_top_layer_first() {
        let device = Default::default();
        let rnn = Hmlstm::<Backend>::new(2, &[4, 4], &device).unwrap();
        let out = rnn.forward(Tensor::zeros([10, 1, 2], &device), None);

        let text = out.boundaries.render(0, 5);
        let rows: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.len() == 5));
    }
}
