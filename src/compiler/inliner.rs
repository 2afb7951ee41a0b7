//! Late inlining of reboxing calls.
//!
//! Calls registered through [`Compile::add_vector_reboxing_late_inline`] are inlined
//! by the vector-box phase before boxes are expanded. The inliner is pluggable:
//! embedders with a full inliner supply their own [`ReboxingInliner`]; the default
//! [`IdentityReboxingInliner`] treats every registered call as returning its first
//! argument, which is what the runtime's rebox entry points do.

use crate::{
    compiler::{Compile, EventKind, GraphKit},
    Result,
};

/// Inliner of late reboxing calls.
pub trait ReboxingInliner: Send + Sync {
    /// Returns the name of the inliner, for diagnostics.
    fn name(&self) -> &'static str;

    /// Inlines every pending reboxing call of `c`.
    ///
    /// # Returns
    ///
    /// The number of inlined calls.
    ///
    /// # Errors
    ///
    /// Returns an error if a registered call cannot be inlined.
    fn inline_vector_reboxing_calls(&self, c: &mut Compile) -> Result<usize>;
}

/// Inliner replacing each reboxing call by its first argument.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityReboxingInliner;

impl ReboxingInliner for IdentityReboxingInliner {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn inline_vector_reboxing_calls(&self, c: &mut Compile) -> Result<usize> {
        let mut inlined = 0;
        for call in c.take_vector_reboxing_late_inlines() {
            if c.failing() {
                break;
            }
            if !c.graph().is_live(call) {
                continue;
            }
            let arg = c
                .graph()
                .node(call)?
                .call_args()
                .first()
                .copied()
                .flatten()
                .ok_or_else(|| invariant_error!("reboxing call {} has no argument", call))?;
            let mut kit = GraphKit::from_safepoint(c, call)?;
            kit.replace_call(call, Some(arg))?;
            c.record_for_igvn(arg);
            c.events
                .record(EventKind::ReboxingCallInlined)
                .node(call)
                .message(format!("replaced by {arg}"));
            inlined += 1;
        }
        Ok(inlined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{BasicType, JvmState, Type, CONTROL, PARMS},
        test::int128_session,
    };

    #[test]
    fn test_identity_inliner_forwards_argument() -> Result<()> {
        let (mut c, classes) = int128_session()?;
        let (call, ret, parm, entry_ctrl) = {
            let jvms = JvmState::new(classes.method, 0, 0, 1, 0, 0);
            let (mut kit, parms) =
                GraphKit::at_method_entry(&mut c, &[Type::scalar(BasicType::Int)], jvms)?;
            let entry_ctrl = kit.control();
            let (call, result) = kit.make_call_static_java(
                classes.consume_one,
                &[parms[0]],
                Type::scalar(BasicType::Int),
            )?;
            let ret = kit.return_value(Some(result))?;
            (call, ret, parms[0], entry_ctrl)
        };
        c.add_vector_reboxing_late_inline(call);
        c.add_vector_reboxing_late_inline(call);
        assert_eq!(c.vector_reboxing_late_inlines().len(), 1);

        let inlined = IdentityReboxingInliner.inline_vector_reboxing_calls(&mut c)?;
        assert_eq!(inlined, 1);
        assert!(!c.graph().is_live(call));
        assert_eq!(c.graph().input(ret, PARMS), Some(parm));
        assert_eq!(c.graph().input(ret, CONTROL), Some(entry_ctrl));
        assert!(c.vector_reboxing_late_inlines().is_empty());
        assert!(c.events.has(EventKind::ReboxingCallInlined));
        Ok(())
    }
}
