//! # Tablewise Testing
//!
//! Testing utilities and helpers for the Tablewise booking architecture.
//!
//! This crate provides:
//! - Deterministic clocks for reducers that compare against deadlines
//! - A fluent Given/When/Then harness for testing reducers
//! - Assertion helpers for effect lists

use chrono::{DateTime, Duration, Utc};
use tablewise_core::environment::Clock;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Duration, Utc};
    use std::sync::Mutex;

    /// Fixed, advanceable clock for deterministic tests.
    ///
    /// Always returns the configured time until [`advance`](FixedClock::advance)
    /// moves it, which makes deadline logic (hold countdowns, retry windows)
    /// reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use tablewise_testing::mocks::FixedClock;
    /// use tablewise_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let t0 = clock.now();
    /// clock.advance(Duration::seconds(181));
    /// assert_eq!(clock.now() - t0, Duration::seconds(181));
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: Duration) {
            let mut time = lock(&self.time);
            *time += by;
        }

        /// Set the clock to an absolute time.
        pub fn set(&self, to: DateTime<Utc>) {
            *lock(&self.time) = to;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *lock(&self.time)
        }
    }

    fn lock(time: &Mutex<DateTime<Utc>>) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        match time.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Create a default fixed clock for tests (2025-06-01 12:00:00 UTC).
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which never happens
    /// in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Fluent Given/When/Then harness for reducers.
pub mod reducer_test {
    use smallvec::SmallVec;
    use tablewise_core::{effect::Effect, reducer::Reducer};

    type StateAssertion<S> = Box<dyn FnOnce(&S)>;
    type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

    /// Fluent API for testing reducers with readable Given-When-Then syntax.
    ///
    /// # Example
    ///
    /// ```ignore
    /// ReducerTest::new(BookingReducer::new())
    ///     .with_env(test_environment())
    ///     .given_state(state_with_covers(4))
    ///     .when_action(BookingAction::SetCovers(6))
    ///     .then_state(|state| assert_eq!(state.covers, 6))
    ///     .run();
    /// ```
    pub struct ReducerTest<R, S, A, E>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        reducer: R,
        environment: Option<E>,
        initial_state: Option<S>,
        actions: Vec<A>,
        state_assertions: Vec<StateAssertion<S>>,
        effect_assertions: Vec<EffectAssertion<A>>,
    }

    impl<R, S, A, E> ReducerTest<R, S, A, E>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        /// Create a new reducer test with the given reducer.
        #[must_use]
        pub const fn new(reducer: R) -> Self {
            Self {
                reducer,
                environment: None,
                initial_state: None,
                actions: Vec::new(),
                state_assertions: Vec::new(),
                effect_assertions: Vec::new(),
            }
        }

        /// Set the environment for the test.
        #[must_use]
        pub fn with_env(mut self, env: E) -> Self {
            self.environment = Some(env);
            self
        }

        /// Set the initial state (Given).
        #[must_use]
        pub fn given_state(mut self, state: S) -> Self {
            self.initial_state = Some(state);
            self
        }

        /// Queue an action (When). May be called several times; effect
        /// assertions apply to the effects of the *last* action.
        #[must_use]
        pub fn when_action(mut self, action: A) -> Self {
            self.actions.push(action);
            self
        }

        /// Add an assertion about the resulting state (Then).
        #[must_use]
        pub fn then_state<F>(mut self, assertion: F) -> Self
        where
            F: FnOnce(&S) + 'static,
        {
            self.state_assertions.push(Box::new(assertion));
            self
        }

        /// Add an assertion about the effects of the last action (Then).
        #[must_use]
        pub fn then_effects<F>(mut self, assertion: F) -> Self
        where
            F: FnOnce(&[Effect<A>]) + 'static,
        {
            self.effect_assertions.push(Box::new(assertion));
            self
        }

        /// Run the test and execute all assertions.
        ///
        /// # Panics
        ///
        /// Panics if initial state, at least one action, or the environment
        /// is not set, or if any assertion fails.
        #[allow(clippy::panic)] // Test code can panic
        #[allow(clippy::expect_used)] // Test code can use expect
        pub fn run(self) {
            let mut state = self
                .initial_state
                .expect("Initial state must be set with given_state()");
            let env = self
                .environment
                .expect("Environment must be set with with_env()");
            assert!(
                !self.actions.is_empty(),
                "At least one action must be set with when_action()"
            );

            let mut effects: SmallVec<[Effect<A>; 4]> = SmallVec::new();
            for action in self.actions {
                effects = self.reducer.reduce(&mut state, action, &env);
            }

            for assertion in self.state_assertions {
                assertion(&state);
            }
            for assertion in self.effect_assertions {
                assertion(&effects);
            }
        }
    }
}

/// Helper assertions for effect lists.
pub mod assertions {
    use tablewise_core::effect::{Effect, EffectId};

    /// Assert that there are no effects.
    ///
    /// # Panics
    ///
    /// Panics if effects is not empty.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.is_empty() || matches!(effects, [Effect::None]),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of effects.
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that effects contain at least one Future effect.
    ///
    /// # Panics
    ///
    /// Panics if no Future effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(has_future),
            "Expected at least one Future effect, but none found"
        );
    }

    /// Assert that some effect (possibly nested) occupies the given
    /// cancellation slot.
    ///
    /// # Panics
    ///
    /// Panics if no `Cancellable` effect with the id is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_cancellable<A>(effects: &[Effect<A>], id: EffectId) {
        assert!(
            effects.iter().any(|e| has_cancellable(e, id)),
            "Expected a Cancellable effect under {id:?}, but none found"
        );
    }

    /// Assert that some effect cancels the given slot.
    ///
    /// # Panics
    ///
    /// Panics if no `Cancel` effect with the id is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_cancel<A>(effects: &[Effect<A>], id: EffectId) {
        assert!(
            effects.iter().any(|e| has_cancel(e, id)),
            "Expected a Cancel effect for {id:?}, but none found"
        );
    }

    fn has_future<A>(effect: &Effect<A>) -> bool {
        match effect {
            Effect::Future(_) => true,
            Effect::Parallel(inner) | Effect::Sequential(inner) => inner.iter().any(has_future),
            Effect::Cancellable { effect, .. } => has_future(effect),
            _ => false,
        }
    }

    fn has_cancellable<A>(effect: &Effect<A>, id: EffectId) -> bool {
        match effect {
            Effect::Cancellable { id: found, .. } => *found == id,
            Effect::Parallel(inner) | Effect::Sequential(inner) => {
                inner.iter().any(|e| has_cancellable(e, id))
            }
            _ => false,
        }
    }

    fn has_cancel<A>(effect: &Effect<A>, id: EffectId) -> bool {
        match effect {
            Effect::Cancel(found) => *found == id,
            Effect::Parallel(inner) | Effect::Sequential(inner) => {
                inner.iter().any(|e| has_cancel(e, id))
            }
            Effect::Cancellable { effect, .. } => has_cancel(effect, id),
            _ => false,
        }
    }
}

// Re-export commonly used items
pub use assertions::{assert_has_cancel, assert_has_cancellable, assert_no_effects};
pub use mocks::{test_clock, FixedClock};
pub use reducer_test::ReducerTest;
