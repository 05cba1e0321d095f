//! Ready-made handler nodes: sources, sinks, and pure transforms.
//!
//! Ordinary handlers over the public context protocol. None of them
//! carries concurrency logic of its own; they stop producing on a
//! rejected `send` and wind down on end-of-stream, as any conforming
//! handler must.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::context::NodeContext;
use crate::error::BoxError;
use crate::node::Node;

/// Emits each item of `values` in order, stopping early on a rejected
/// send.
pub fn source_iter<T, It>(values: It) -> Node<(), T>
where
    T: Send + 'static,
    It: IntoIterator<Item = T> + Send + 'static,
    It::IntoIter: Send + 'static,
{
    Node::new(|ctx| async move {
        for value in values {
            if !ctx.send(value).await {
                break;
            }
        }
        Ok(())
    })
}

/// Applies `transform` to every input value and forwards the result.
///
/// A transform error ends the node with that error; values already
/// forwarded are unaffected.
pub fn map<A, B, F>(mut transform: F) -> Node<A, B>
where
    A: Send + 'static,
    B: Send + 'static,
    F: FnMut(A) -> Result<B, BoxError> + Send + 'static,
{
    Node::new(|mut ctx| async move {
        while let Some(value) = ctx.recv().await {
            let mapped = transform(value)?;
            if !ctx.send(mapped).await {
                break;
            }
        }
        Ok(())
    })
}

/// Forwards only the values `keep` accepts.
pub fn filter<T, F>(mut keep: F) -> Node<T, T>
where
    T: Send + 'static,
    F: FnMut(&T) -> bool + Send + 'static,
{
    Node::new(|mut ctx| async move {
        while let Some(value) = ctx.recv().await {
            if keep(&value) && !ctx.send(value).await {
                break;
            }
        }
        Ok(())
    })
}

/// Consumes every input value with `visit`. A visit error ends the
/// node with that error.
pub fn each<T, F>(mut visit: F) -> Node<T, ()>
where
    T: Send + 'static,
    F: FnMut(T) -> Result<(), BoxError> + Send + 'static,
{
    Node::new(|mut ctx| async move {
        while let Some(value) = ctx.recv().await {
            visit(value)?;
        }
        Ok(())
    })
}

/// Reads `chunk_size`-byte chunks from `reader` until end of input.
pub fn reader_source<R>(mut reader: R, chunk_size: usize) -> Node<(), Bytes>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    Node::new(move |ctx| async move {
        let mut buf = vec![0u8; chunk_size];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            if !ctx.send(Bytes::copy_from_slice(&buf[..n])).await {
                return Ok(());
            }
        }
    })
}

/// Writes every input chunk to `writer`, flushing at end of stream.
pub fn writer_sink<W>(mut writer: W) -> Node<Bytes, ()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    Node::new(move |mut ctx: NodeContext<Bytes, ()>| async move {
        while let Some(chunk) = ctx.recv().await {
            writer.write_all(&chunk).await?;
        }
        writer.flush().await?;
        Ok(())
    })
}

/// Splits byte chunks into lines, carrying partial lines across chunk
/// boundaries.
///
/// Emits each line without its `\n` (or `\r\n`) terminator; a trailing
/// unterminated line is emitted at end of stream. Input is decoded
/// lossily as UTF-8.
pub fn lines() -> Node<Bytes, String> {
    Node::new(|mut ctx: NodeContext<Bytes, String>| async move {
        let mut pending: Vec<u8> = Vec::new();
        while let Some(chunk) = ctx.recv().await {
            pending.extend_from_slice(&chunk);
            while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = pending.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if !ctx.send(String::from_utf8_lossy(&line).into_owned()).await {
                    return Ok(());
                }
            }
        }
        if !pending.is_empty() {
            ctx.send(String::from_utf8_lossy(&pending).into_owned()).await;
        }
        Ok(())
    })
}
