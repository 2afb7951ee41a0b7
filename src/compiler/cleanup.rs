//! Post-phase graph housekeeping.
//!
//! The vector-box stages leave behind nodes that nothing reaches any more and nodes
//! that fold away once boxes are gone. [`do_cleanup`] removes the unreachable part of
//! the graph, runs [`PhaseIterGvn`], and optionally renumbers the graph densely.

use crate::{
    compiler::{gvn::IgvnStats, Compile, EventKind, PhaseIterGvn},
    Result,
};

/// Result of a cleanup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    /// Nodes removed because the root no longer reaches them
    pub useless: usize,
    /// Value-numbering statistics
    pub igvn: IgvnStats,
    /// Whether the graph was renumbered
    pub compacted: bool,
}

/// Removes every node the root cannot reach.
///
/// Session lists are pruned of the removed nodes.
///
/// # Returns
///
/// The number of removed nodes.
pub fn remove_useless_nodes(c: &mut Compile) -> usize {
    let reachable = c.graph().reachable_from_root();
    let removed = c.graph_mut().remove_unreachable(&reachable);
    c.prune_dead_entries();
    if !removed.is_empty() {
        c.events
            .record(EventKind::UselessRemoved)
            .message(format!("{} nodes", removed.len()));
    }
    removed.len()
}

/// Renumbers the graph densely and renames every id held by the session.
///
/// # Returns
///
/// The remapping table from old to new ids.
pub fn compact(c: &mut Compile) -> Vec<Option<crate::ir::NodeId>> {
    let before = c.graph().len();
    let remap = c.graph_mut().compact();
    c.apply_remap(&remap);
    c.events
        .record(EventKind::GraphCompacted)
        .message(format!("{before} -> {} slots", c.graph().len()));
    remap
}

/// Removes useless nodes, then runs value numbering to a fixed point.
///
/// Compaction runs afterwards if the session's configuration asks for it.
///
/// # Errors
///
/// Propagates invariant errors from value numbering.
pub fn do_cleanup(c: &mut Compile) -> Result<CleanupStats> {
    let useless = remove_useless_nodes(c);
    let igvn = PhaseIterGvn::new().optimize(c)?;
    let compacted = c.config().compact_after_cleanup && !c.failing();
    if compacted {
        compact(c);
    }
    Ok(CleanupStats {
        useless,
        igvn,
        compacted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{BasicType, Op, Type},
        test::int128_session,
    };

    #[test]
    fn test_unreachable_nodes_removed() -> Result<()> {
        let (mut c, _) = int128_session()?;
        let a = c.intcon(1)?;
        let orphan = c.new_node(Op::CastPP, Type::scalar(BasicType::Int), vec![None, Some(a)])?;
        c.record_for_igvn(orphan);
        let removed = remove_useless_nodes(&mut c);
        assert!(removed >= 2);
        assert!(!c.graph().is_live(orphan));
        assert!(c.for_igvn().is_empty());
        assert!(c.events.has(EventKind::UselessRemoved));
        Ok(())
    }

    #[test]
    fn test_compaction_remaps_session_lists() -> Result<()> {
        let (mut c, _) = int128_session()?;
        let a = c.intcon(1)?;
        let b = c.intcon(2)?;
        let keep = c.new_node(Op::CastPP, Type::scalar(BasicType::Int), vec![None, Some(b)])?;
        c.record_for_igvn(keep);
        c.remove_node(a)?;

        let remap = compact(&mut c);
        let new_keep = remap[keep.index()];
        assert!(new_keep.is_some());
        assert_eq!(remap[a.index()], None);
        assert_eq!(c.for_igvn().at(0), new_keep);
        assert_eq!(c.graph().len(), c.graph().live_count());
        Ok(())
    }
}
