//! Fluent chain builder: wire N nodes, one typed joint at a time.

use tokio_util::sync::CancellationToken;

use crate::node::{BoxedNode, Node};
use crate::run::{run, Reports};
use crate::wire::{self, WireOut};

/// Internal view of the chain's tail: a node whose output of type `T`
/// is still unwired.
trait Tail<T>: Send {
    fn install_output(&mut self, wire: WireOut<T>);
    fn into_boxed(self: Box<Self>) -> BoxedNode;
}

impl<I, T> Tail<T> for Node<I, T>
where
    I: Send + 'static,
    T: Send + 'static,
{
    fn install_output(&mut self, wire: WireOut<T>) {
        Node::install_output(self, wire);
    }

    fn into_boxed(self: Box<Self>) -> BoxedNode {
        BoxedNode::from(*self)
    }
}

/// An ordered chain of nodes wired pairwise.
///
/// The generalized N-ary connector: a chain of N nodes is N−1
/// applications of the pairwise [`connect`](crate::connect), and each
/// [`then`](Chain::then) call type-checks exactly one joint. The type
/// parameter is the element type of the chain's unwired tail output.
///
/// ```rust,ignore
/// let reports = Chain::start(numbers)
///     .then(doubler)
///     .then(summer)
///     .run(CancellationToken::new());
/// ```
pub struct Chain<T> {
    wired: Vec<BoxedNode>,
    tail: Box<dyn Tail<T>>,
}

impl<T: Send + 'static> Chain<T> {
    /// Starts a chain at `head`.
    #[must_use]
    pub fn start<I>(head: Node<I, T>) -> Self
    where
        I: Send + 'static,
    {
        Self {
            wired: Vec::new(),
            tail: Box::new(head),
        }
    }

    /// Appends `next`, wiring its input to the current tail's output.
    ///
    /// # Panics
    ///
    /// Panics if either adjacent port is already wired (fan-out/fan-in).
    #[must_use]
    pub fn then<U>(mut self, mut next: Node<T, U>) -> Chain<U>
    where
        U: Send + 'static,
    {
        let (out, inp) = wire::pair();
        self.tail.install_output(out);
        next.install_input(inp);
        self.wired.push(self.tail.into_boxed());
        Chain {
            wired: self.wired,
            tail: Box::new(next),
        }
    }

    /// The chain's nodes in order, ready for [`run`](crate::run).
    #[must_use]
    pub fn into_nodes(self) -> Vec<BoxedNode> {
        let mut nodes = self.wired;
        nodes.push(self.tail.into_boxed());
        nodes
    }

    /// Runs the chain under `cancel` and returns its report stream.
    pub fn run(self, cancel: CancellationToken) -> Reports {
        run(cancel, self.into_nodes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passthrough() -> Node<i32, i32> {
        Node::new(|mut ctx| async move {
            while let Some(value) = ctx.recv().await {
                if !ctx.send(value).await {
                    break;
                }
            }
            Ok(())
        })
    }

    #[test]
    fn test_chain_collects_every_node_in_order() {
        let head: Node<(), i32> = Node::new(|_ctx| async { Ok(()) });
        let sink: Node<i32, ()> = Node::new(|_ctx| async { Ok(()) });
        let nodes = Chain::start(head)
            .then(passthrough())
            .then(passthrough())
            .then(sink)
            .into_nodes();
        assert_eq!(nodes.len(), 4);
    }

    #[test]
    #[should_panic(expected = "fan-in is not supported")]
    fn test_chaining_onto_a_wired_input_panics() {
        let head: Node<(), i32> = Node::new(|_ctx| async { Ok(()) });
        let mut pre = passthrough();
        let mut mid = passthrough();
        crate::connect(&mut pre, &mut mid);
        let _ = Chain::start(head).then(mid);
    }
}
