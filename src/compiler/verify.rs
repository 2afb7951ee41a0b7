//! Structural verification of the graph after the vector-box phase.

use crate::{
    compiler::Compile,
    ir::{NodeId, Op},
    Error, Result,
};

/// Checks the graph invariants that must hold once the phase has completed.
///
/// - use lists mirror input lists exactly
/// - every input of a live node is live
/// - no box, unbox or pending box allocation is left
/// - every scalar-object descriptor's fields lie inside its safepoint's inputs
/// - the macro list holds only live macro nodes
///
/// # Errors
///
/// Returns an invariant error describing the first violation found.
pub fn verify_graph(c: &Compile) -> Result<()> {
    let graph = c.graph();
    for id in graph.live_nodes() {
        let node = graph.node(id)?;

        for (pos, input) in node.inputs().iter().enumerate() {
            let Some(def) = *input else { continue };
            if !graph.is_live(def) {
                return Err(invariant_error!("input {} of {} is the removed node {}", pos, id, def));
            }
            let expected = node.inputs().iter().filter(|&&i| i == Some(def)).count();
            let actual = graph.outs(def).iter().filter(|&&u| u == id).count();
            if expected != actual {
                return Err(invariant_error!(
                    "{} uses {} {} times but the use list records {}",
                    id,
                    def,
                    expected,
                    actual
                ));
            }
        }
        for &user in node.outs() {
            if !graph.node(user)?.inputs().contains(&Some(id)) {
                return Err(invariant_error!("{} lists {} as a user without an edge", id, user));
            }
        }

        if matches!(
            node.op(),
            Op::VectorBox { .. } | Op::VectorUnbox { .. } | Op::VectorBoxAllocate { .. }
        ) {
            return Err(Error::UnexpectedNode {
                node: id,
                expected: "no vector box nodes after the phase",
                actual: node.op().name().to_string(),
            });
        }

        if let Some(jvms) = node.jvms() {
            for &sobj in node.inputs()[jvms.debug_start().min(node.req())..].iter().flatten() {
                verify_scalar_object(c, id, sobj)?;
            }
        }
    }

    for id in c.macro_nodes() {
        match graph.try_node(id) {
            Some(node) if node.is_macro() => {}
            _ => {
                return Err(invariant_error!(
                    "macro list holds {} which is not a live macro node",
                    id
                ))
            }
        }
    }
    Ok(())
}

fn verify_scalar_object(c: &Compile, sfpt: NodeId, sobj: NodeId) -> Result<()> {
    let graph = c.graph();
    let Some(Op::SafePointScalarObject {
        first_index,
        n_fields,
        ..
    }) = graph.op(sobj)
    else {
        return Ok(());
    };
    let node = graph.node(sfpt)?;
    let Some(jvms) = node.jvms() else {
        return Ok(());
    };
    let end = jvms.scloff() + *first_index as usize + *n_fields as usize;
    if end > node.req() || end > jvms.debug_end() {
        return Err(invariant_error!(
            "{} describes fields up to input {} but {} has {} inputs",
            sobj,
            end,
            sfpt,
            node.req()
        ));
    }
    Ok(())
}
