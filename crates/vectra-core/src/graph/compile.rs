//! Graph compilation: execution order, signal allocation and input binding.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::CompileError;
use crate::processor::{InputBinding, ProcessContext};
use crate::signal::SignalBuffer;

use super::{Graph, WireSource};

/// The executable form of a graph for one vector size.
#[derive(Debug, Clone)]
pub(crate) struct CompiledGraph {
    /// Node indices in execution order.
    pub order: Vec<usize>,
    /// Pool index of each node's first output. Outputs are contiguous.
    pub slot_start: Vec<usize>,
    /// Per node, one binding per declared input.
    pub bindings: Vec<Vec<InputBinding>>,
    pub ctx: ProcessContext,
}

impl Graph {
    /// Orders the nodes, allocates one signal buffer per output slot sized
    /// to `ctx.vector_size`, and binds every input.
    ///
    /// On failure the previous compilation (if any) is left in place and
    /// remains runnable.
    pub fn compile(&mut self, ctx: ProcessContext) -> Result<(), CompileError> {
        if ctx.vector_size == 0 {
            return Err(CompileError::ZeroVectorSize);
        }
        let order = self.topological_order()?;

        let mut slot_start = Vec::with_capacity(self.nodes.len());
        let mut pool = Vec::new();
        for node in &self.nodes {
            slot_start.push(pool.len());
            for output in 0..node.outputs.len() {
                let mut buf = SignalBuffer::try_new(ctx.vector_size, node.output_channels(output))?;
                buf.set_sample_rate(ctx.sample_rate);
                pool.push(buf);
            }
        }

        let mut bindings: Vec<Vec<InputBinding>> = self
            .nodes
            .iter()
            .map(|n| vec![InputBinding::Unconnected; n.inputs.len()])
            .collect();
        for wire in &self.wires {
            bindings[wire.to][wire.input] = match wire.source {
                WireSource::Output {
                    node,
                    output,
                    channel,
                } => InputBinding::Slot {
                    slot: slot_start[node] + output,
                    channel,
                },
                WireSource::Constant(v) => InputBinding::Constant(v),
            };
        }

        let mut mix = SignalBuffer::try_new(ctx.vector_size, self.output_channels)?;
        mix.set_sample_rate(ctx.sample_rate);

        for node in &mut self.nodes {
            node.kind.processor_mut().prepare(&ctx);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "graph_compile: {} nodes, {} slots, vector {}",
            order.len(),
            pool.len(),
            ctx.vector_size
        );

        self.pool = pool;
        self.mix = mix;
        self.compiled = Some(CompiledGraph {
            order,
            slot_start,
            bindings,
            ctx,
        });
        Ok(())
    }

    /// Kahn's algorithm over the wiring table. Among ready nodes the one
    /// declared first runs first, so the order is reproducible.
    fn topological_order(&self) -> Result<Vec<usize>, CompileError> {
        let n = self.nodes.len();
        let mut in_degree = vec![0usize; n];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
        for wire in &self.wires {
            if let WireSource::Output { node, .. } = wire.source {
                successors[node].push(wire.to);
                in_degree[wire.to] += 1;
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
            .filter(|&i| in_degree[i] == 0)
            .map(Reverse)
            .collect();
        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(i)) = ready.pop() {
            order.push(i);
            for &next in &successors[i] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() < n {
            let nodes: Vec<String> = (0..n)
                .filter(|&i| in_degree[i] > 0)
                .map(|i| self.nodes[i].path.clone())
                .collect();
            #[cfg(feature = "tracing")]
            tracing::debug!("graph_sort: cycle through {nodes:?}");
            return Err(CompileError::Cycle { nodes });
        }

        #[cfg(feature = "tracing")]
        {
            let paths: Vec<&str> = order.iter().map(|&i| self.nodes[i].path.as_str()).collect();
            tracing::debug!("graph_sort: {}", paths.join(" → "));
        }
        Ok(order)
    }
}
