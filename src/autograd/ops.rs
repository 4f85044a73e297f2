//! Autograd operations with backward passes
//!
//! Matrices are stored row-major in flat tensors; shapes are passed
//! explicitly.

use super::{BackwardOp, Tensor};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

type GradCell = Rc<RefCell<Option<Array1<f32>>>>;

/// Matrix multiplication
///
/// Computes C = A @ B where:
/// - A is m×k (flattened to length m*k)
/// - B is k×n (flattened to length k*n)
/// - C is m×n (flattened to length m*n)
pub fn matmul(a: &Tensor, b: &Tensor, m: usize, k: usize, n: usize) -> Tensor {
    assert_eq!(a.len(), m * k, "Matrix A size mismatch");
    assert_eq!(b.len(), k * n, "Matrix B size mismatch");

    let a_data = a.data();
    let b_data = b.data();
    let mut result_data = vec![0.0; m * n];
    for i in 0..m {
        for p in 0..k {
            let a_ip = a_data[i * k + p];
            if a_ip == 0.0 {
                continue;
            }
            for j in 0..n {
                result_data[i * n + j] += a_ip * b_data[p * n + j];
            }
        }
    }

    let requires_grad = a.requires_grad() || b.requires_grad();
    let mut result = Tensor::new(Array1::from(result_data), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(MatmulBackward {
            a: a.clone(),
            b: b.clone(),
            m,
            k,
            n,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct MatmulBackward {
    a: Tensor,
    b: Tensor,
    m: usize,
    k: usize,
    n: usize,
    result_grad: GradCell,
}

impl BackwardOp for MatmulBackward {
    fn backward(&self) {
        let Some(grad_output) = self.result_grad.borrow().clone() else {
            return;
        };
        let (m, k, n) = (self.m, self.k, self.n);

        // ∂L/∂A = ∂L/∂C @ B^T
        if self.a.requires_grad() {
            let b_data = self.b.data();
            let mut grad_a = vec![0.0; m * k];
            for i in 0..m {
                for p in 0..k {
                    let mut sum = 0.0;
                    for j in 0..n {
                        sum += grad_output[i * n + j] * b_data[p * n + j];
                    }
                    grad_a[i * k + p] = sum;
                }
            }
            self.a.accumulate_grad(Array1::from(grad_a));
        }

        // ∂L/∂B = A^T @ ∂L/∂C
        if self.b.requires_grad() {
            let a_data = self.a.data();
            let mut grad_b = vec![0.0; k * n];
            for p in 0..k {
                for j in 0..n {
                    let mut sum = 0.0;
                    for i in 0..m {
                        sum += a_data[i * k + p] * grad_output[i * n + j];
                    }
                    grad_b[p * n + j] = sum;
                }
            }
            self.b.accumulate_grad(Array1::from(grad_b));
        }

        if let Some(op) = self.a.backward_op() {
            op.backward();
        }
        if let Some(op) = self.b.backward_op() {
            op.backward();
        }
    }
}

/// Add a bias row to every row of a rows×cols matrix
pub fn add_bias(x: &Tensor, bias: &Tensor, rows: usize, cols: usize) -> Tensor {
    assert_eq!(x.len(), rows * cols, "Input size mismatch");
    assert_eq!(bias.len(), cols, "Bias size mismatch");

    let mut data = x.data().clone();
    for (i, value) in data.iter_mut().enumerate() {
        *value += bias.data()[i % cols];
    }

    let requires_grad = x.requires_grad() || bias.requires_grad();
    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(AddBiasBackward {
            x: x.clone(),
            bias: bias.clone(),
            rows,
            cols,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct AddBiasBackward {
    x: Tensor,
    bias: Tensor,
    rows: usize,
    cols: usize,
    result_grad: GradCell,
}

impl BackwardOp for AddBiasBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow().clone() else {
            return;
        };

        if self.x.requires_grad() {
            self.x.accumulate_grad(grad.clone());
        }
        if self.bias.requires_grad() {
            // Column sums: the bias is broadcast over rows
            let mut grad_bias = vec![0.0; self.cols];
            for r in 0..self.rows {
                for (c, g) in grad_bias.iter_mut().enumerate() {
                    *g += grad[r * self.cols + c];
                }
            }
            self.bias.accumulate_grad(Array1::from(grad_bias));
        }

        if let Some(op) = self.x.backward_op() {
            op.backward();
        }
        if let Some(op) = self.bias.backward_op() {
            op.backward();
        }
    }
}

/// ReLU activation
pub fn relu(a: &Tensor) -> Tensor {
    let data = a.data().mapv(|x| x.max(0.0));
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ReluBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ReluBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for ReluBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow().clone() else {
            return;
        };

        if self.a.requires_grad() {
            // ∂L/∂a = ∂L/∂out * (a > 0)
            let mask = self.a.data().mapv(|x| if x > 0.0 { 1.0 } else { 0.0 });
            self.a.accumulate_grad(&grad * &mask);
        }

        if let Some(op) = self.a.backward_op() {
            op.backward();
        }
    }
}

/// Mean squared error against a constant target, as a one-element tensor
pub fn mse(predictions: &Tensor, targets: &Tensor) -> Tensor {
    assert_eq!(predictions.len(), targets.len(), "Target size mismatch");

    let n = predictions.len().max(1) as f32;
    let diff = predictions.data() - targets.data();
    let loss = diff.mapv(|d| d * d).sum() / n;

    let requires_grad = predictions.requires_grad();
    let mut result = Tensor::from_vec(vec![loss], requires_grad);

    if requires_grad {
        let backward_op = Rc::new(MseBackward {
            predictions: predictions.clone(),
            diff,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct MseBackward {
    predictions: Tensor,
    diff: Array1<f32>,
    result_grad: GradCell,
}

impl BackwardOp for MseBackward {
    fn backward(&self) {
        let Some(grad) = self.result_grad.borrow().clone() else {
            return;
        };
        let upstream = grad.first().copied().unwrap_or(1.0);
        let n = self.diff.len().max(1) as f32;

        // ∂L/∂pred = 2 (pred - target) / n
        self.predictions
            .accumulate_grad(self.diff.mapv(|d| 2.0 * d * upstream / n));

        if let Some(op) = self.predictions.backward_op() {
            op.backward();
        }
    }
}
