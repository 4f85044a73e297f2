//! Backward operation trait

/// A recorded node of the gradient tape
pub trait BackwardOp {
    /// Push the node's output gradient into its inputs, then recurse
    fn backward(&self);
}
