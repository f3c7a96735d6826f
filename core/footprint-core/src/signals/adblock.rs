//! Ad-block probe: the heuristic itself lives in the host.

/// Answers "is an ad blocker active?" once per activation.
pub trait AdBlockProbe: Send + Sync {
    fn is_blocked(&self) -> bool;
}

impl<F> AdBlockProbe for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_blocked(&self) -> bool {
        self()
    }
}

/// A probe with a predetermined answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe(pub bool);

impl AdBlockProbe for FixedProbe {
    fn is_blocked(&self) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_and_fixed_probes() {
        let probe = || true;
        assert!(probe.is_blocked());
        assert!(!FixedProbe(false).is_blocked());
    }
}
