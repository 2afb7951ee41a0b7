//! Debug state of safepoints and calls.

use crate::meta::MethodId;

/// Interpreter state recorded at a safepoint, used to rebuild the frame on
/// deoptimization.
///
/// The offsets index the owning node's inputs and partition its debug range:
///
/// ```text
/// [locoff, stkoff)   local variables
/// [stkoff, monoff)   expression stack slots; the first `sp` are live
/// [monoff, scloff)   monitors
/// [scloff, endoff)   field values of scalar-replaced objects
/// ```
///
/// `debug_start() == locoff` and `debug_end() == endoff`. Everything before `locoff`
/// is plumbing or call arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JvmState {
    method: MethodId,
    bci: u32,
    locoff: usize,
    stkoff: usize,
    monoff: usize,
    scloff: usize,
    endoff: usize,
    sp: usize,
    should_reexecute: bool,
}

impl JvmState {
    /// Creates the debug state of a frame with `nlocals` locals, `nstack` stack slots
    /// (all live) and `nmonitors` monitors, laid out from input `locoff` on.
    #[must_use]
    pub fn new(
        method: MethodId,
        bci: u32,
        locoff: usize,
        nlocals: usize,
        nstack: usize,
        nmonitors: usize,
    ) -> Self {
        let stkoff = locoff + nlocals;
        let monoff = stkoff + nstack;
        let scloff = monoff + nmonitors;
        Self {
            method,
            bci,
            locoff,
            stkoff,
            monoff,
            scloff,
            endoff: scloff,
            sp: nstack,
            should_reexecute: false,
        }
    }

    /// Method the frame belongs to.
    #[must_use]
    pub fn method(&self) -> MethodId {
        self.method
    }

    /// Bytecode index of the frame.
    #[must_use]
    pub fn bci(&self) -> u32 {
        self.bci
    }

    /// First input of the locals.
    #[must_use]
    pub fn locoff(&self) -> usize {
        self.locoff
    }

    /// First input of the expression stack.
    #[must_use]
    pub fn stkoff(&self) -> usize {
        self.stkoff
    }

    /// First input of the monitors.
    #[must_use]
    pub fn monoff(&self) -> usize {
        self.monoff
    }

    /// First input of the scalar-replaced object fields.
    #[must_use]
    pub fn scloff(&self) -> usize {
        self.scloff
    }

    /// One past the last debug input.
    #[must_use]
    pub fn endoff(&self) -> usize {
        self.endoff
    }

    /// First input of the debug range.
    #[must_use]
    pub fn debug_start(&self) -> usize {
        self.locoff
    }

    /// One past the last input of the debug range.
    #[must_use]
    pub fn debug_end(&self) -> usize {
        self.endoff
    }

    /// Number of live expression stack slots.
    #[must_use]
    pub fn sp(&self) -> usize {
        self.sp
    }

    /// Number of expression stack slots, live or not.
    #[must_use]
    pub fn stack_capacity(&self) -> usize {
        self.monoff - self.stkoff
    }

    /// Number of locals.
    #[must_use]
    pub fn loc_size(&self) -> usize {
        self.stkoff - self.locoff
    }

    /// Number of monitor slots.
    #[must_use]
    pub fn mon_size(&self) -> usize {
        self.scloff - self.monoff
    }

    /// Number of scalar-object field slots.
    #[must_use]
    pub fn scl_size(&self) -> usize {
        self.endoff - self.scloff
    }

    /// Whether deoptimization at this state re-executes the current bytecode.
    #[must_use]
    pub fn should_reexecute(&self) -> bool {
        self.should_reexecute
    }

    /// Sets whether deoptimization re-executes the current bytecode.
    pub fn set_should_reexecute(&mut self, reexecute: bool) {
        self.should_reexecute = reexecute;
    }

    /// Sets the number of live stack slots.
    pub fn set_sp(&mut self, sp: usize) {
        self.sp = sp;
    }

    /// Sets the end of the debug range after scalar-object fields were appended.
    pub fn set_endoff(&mut self, endoff: usize) {
        self.endoff = endoff;
    }

    /// Grows the expression stack to `capacity` slots, shifting monitors and
    /// scalar-object fields up.
    ///
    /// # Returns
    ///
    /// The number of slots inserted at the old `monoff`.
    pub fn grow_stack(&mut self, capacity: usize) -> usize {
        let current = self.stack_capacity();
        if capacity <= current {
            return 0;
        }
        let grow = capacity - current;
        self.monoff += grow;
        self.scloff += grow;
        self.endoff += grow;
        grow
    }

    /// Returns the same state with the debug range moved to start at `locoff`.
    #[must_use]
    pub fn rebased(&self, locoff: usize) -> JvmState {
        let shift = |off: usize| off - self.locoff + locoff;
        JvmState {
            locoff,
            stkoff: shift(self.stkoff),
            monoff: shift(self.monoff),
            scloff: shift(self.scloff),
            endoff: shift(self.endoff),
            ..self.clone()
        }
    }

    /// Returns `true` if input `index` lies in the debug range.
    #[must_use]
    pub fn is_debug_input(&self, index: usize) -> bool {
        (self.locoff..self.endoff).contains(&index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let jvms = JvmState::new(MethodId::new(0), 12, 5, 3, 2, 1);
        assert_eq!(jvms.debug_start(), 5);
        assert_eq!(jvms.stkoff(), 8);
        assert_eq!(jvms.monoff(), 10);
        assert_eq!(jvms.scloff(), 11);
        assert_eq!(jvms.debug_end(), 11);
        assert_eq!(jvms.sp(), 2);
        assert!(jvms.is_debug_input(5));
        assert!(!jvms.is_debug_input(11));
    }

    #[test]
    fn test_grow_stack() {
        let mut jvms = JvmState::new(MethodId::new(0), 0, 5, 2, 0, 0);
        assert_eq!(jvms.grow_stack(3), 3);
        assert_eq!(jvms.stack_capacity(), 3);
        assert_eq!(jvms.monoff(), 10);
        assert_eq!(jvms.grow_stack(2), 0);
    }

    #[test]
    fn test_rebased() {
        let mut jvms = JvmState::new(MethodId::new(1), 4, 7, 2, 1, 0);
        jvms.set_endoff(jvms.scloff() + 1);
        let rebased = jvms.rebased(0);
        assert_eq!(rebased.locoff(), 0);
        assert_eq!(rebased.stkoff(), 2);
        assert_eq!(rebased.scloff(), 3);
        assert_eq!(rebased.endoff(), 4);
        assert_eq!(rebased.rebased(7), jvms);
    }
}
