//! Tests for autograd operations with gradient checking

use super::*;
use approx::assert_abs_diff_eq;
use proptest::prelude::*;

/// Finite difference gradient checker
///
/// Computes numerical gradient using central difference:
/// f'(x) ≈ (f(x + h) - f(x - h)) / (2h)
fn finite_difference<F>(f: F, x: &[f32], epsilon: f32) -> Vec<f32>
where
    F: Fn(&[f32]) -> f32,
{
    let mut grad = vec![0.0; x.len()];
    let mut x_plus = x.to_vec();
    let mut x_minus = x.to_vec();

    for i in 0..x.len() {
        x_plus[i] = x[i] + epsilon;
        x_minus[i] = x[i] - epsilon;
        grad[i] = (f(&x_plus) - f(&x_minus)) / (2.0 * epsilon);
        x_plus[i] = x[i];
        x_minus[i] = x[i];
    }

    grad
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_tensor_grad_accumulation() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);

        t.accumulate_grad(ndarray::arr1(&[1.0, 1.0, 1.0]));
        assert_eq!(t.grad().unwrap()[0], 1.0);

        t.accumulate_grad(ndarray::arr1(&[1.0, 1.0, 1.0]));
        assert_eq!(t.grad().unwrap()[0], 2.0);
    }

    #[test]
    fn test_clone_shares_grad_cell() {
        let t = Tensor::from_vec(vec![1.0, 2.0], true);
        let alias = t.clone();
        alias.accumulate_grad(ndarray::arr1(&[0.5, 0.5]));
        assert_eq!(t.grad().unwrap()[1], 0.5);
    }

    #[test]
    fn test_detach_drops_history() {
        let t = Tensor::from_vec(vec![1.0, 2.0], true);
        t.accumulate_grad(ndarray::arr1(&[1.0, 1.0]));
        let d = t.detach();
        assert!(!d.requires_grad());
        assert!(d.grad().is_none());
        assert_eq!(d, t);
    }

    #[test]
    fn test_disable_requires_grad_clears_grad() {
        let mut t = Tensor::from_vec(vec![1.0], true);
        t.accumulate_grad(ndarray::arr1(&[3.0]));
        t.set_requires_grad(false);
        assert!(t.grad().is_none());
    }

    #[test]
    fn test_matmul_forward() {
        // [1 2; 3 4] @ [5; 6] = [17; 39]
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], false);
        let b = Tensor::from_vec(vec![5.0, 6.0], false);
        let c = matmul(&a, &b, 2, 2, 1);
        assert_eq!(c.to_vec(), vec![17.0, 39.0]);
    }

    #[test]
    fn test_add_bias_forward_and_backward() {
        let x = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], true);
        let b = Tensor::from_vec(vec![10.0, 20.0, 30.0], true);
        let mut y = add_bias(&x, &b, 2, 3);
        assert_eq!(y.to_vec(), vec![11.0, 22.0, 33.0, 14.0, 25.0, 36.0]);

        backward(&mut y, None);
        assert_eq!(b.grad().unwrap().to_vec(), vec![2.0, 2.0, 2.0]);
        assert_eq!(x.grad().unwrap().to_vec(), vec![1.0; 6]);
    }

    #[test]
    fn test_relu_backward_masks_negatives() {
        let a = Tensor::from_vec(vec![-1.0, 0.5, 2.0], true);
        let mut r = relu(&a);
        backward(&mut r, None);
        assert_eq!(a.grad().unwrap().to_vec(), vec![0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_mse_value() {
        let p = Tensor::from_vec(vec![1.0, 3.0], false);
        let t = Tensor::from_vec(vec![0.0, 1.0], false);
        let l = mse(&p, &t);
        assert_abs_diff_eq!(l.data()[0], 2.5);
    }

    #[test]
    fn test_mse_backpropagates_through_graph() {
        // loss = mean((x @ w + b - t)^2); gradient must reach w and b
        let x = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], false);
        let w = Tensor::from_vec(vec![0.5, -0.5], true);
        let b = Tensor::from_vec(vec![0.1], true);
        let t = Tensor::from_vec(vec![1.0, 0.0], false);

        let out = add_bias(&matmul(&x, &w, 2, 2, 1), &b, 2, 1);
        let mut loss = mse(&out, &t);
        backward(&mut loss, None);

        let loss_of_w = |wv: &[f32]| {
            let x = [1.0, 2.0, 3.0, 4.0];
            let p0 = x[0] * wv[0] + x[1] * wv[1] + 0.1;
            let p1 = x[2] * wv[0] + x[3] * wv[1] + 0.1;
            ((p0 - 1.0).powi(2) + p1.powi(2)) / 2.0
        };
        let numeric = finite_difference(loss_of_w, &[0.5, -0.5], 1e-3);
        let analytic = w.grad().unwrap();
        for (a, n) in analytic.iter().zip(numeric.iter()) {
            assert_abs_diff_eq!(*a, *n, epsilon = 1e-2);
        }
        assert!(b.grad().is_some());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_matmul_gradient_matches_finite_difference(
        a in prop::collection::vec(-2.0f32..2.0, 6),
        b in prop::collection::vec(-2.0f32..2.0, 3),
    ) {
        // (2x3) @ (3x1), summed
        let ta = Tensor::from_vec(a.clone(), true);
        let tb = Tensor::from_vec(b.clone(), false);
        let mut c = matmul(&ta, &tb, 2, 3, 1);
        backward(&mut c, None);

        let f = |av: &[f32]| {
            (0..2)
                .map(|i| (0..3).map(|p| av[i * 3 + p] * b[p]).sum::<f32>())
                .sum::<f32>()
        };
        let numeric = finite_difference(f, &a, 1e-2);
        let analytic = ta.grad().unwrap();
        for (x, y) in analytic.iter().zip(numeric.iter()) {
            prop_assert!((x - y).abs() < 1e-2);
        }
    }
}
