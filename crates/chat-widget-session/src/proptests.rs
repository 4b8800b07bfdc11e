//! Property-based tests for the session controller
//!
//! These drive the synchronous half of the controller (admit, then complete
//! with a generated outcome) so no network or runtime is involved after startup.

use std::{collections::HashMap, sync::Arc};

use chat_widget_core::{ActivationKey, BotReply, ReplyError, ReplyOption, WidgetConfig};
use proptest::prelude::*;

use crate::{
    Completion, SessionController, storage::MemoryTokenStore, testing::ScriptedClient,
};

type Controller = SessionController<ScriptedClient, MemoryTokenStore>;

// ============================================================================
// Generators
// ============================================================================

#[derive(Debug, Clone)]
enum Action {
    Type(String),
    /// Index into the current selectable positions (wrapped).
    Click(usize),
}

#[derive(Debug, Clone)]
enum Outcome {
    Reply(String, Vec<(String, String)>),
    Service(Option<String>),
    Transport,
}

impl Outcome {
    fn into_result(self) -> Result<BotReply, ReplyError> {
        match self {
            Self::Reply(reply, options) => Ok(BotReply {
                session_token: "s1".to_string(),
                reply,
                options: options
                    .into_iter()
                    .map(|(label, query)| ReplyOption::new(label, query))
                    .collect(),
            }),
            Self::Service(message) => Err(ReplyError::Service { message }),
            Self::Transport => Err(ReplyError::Transport("unreachable".to_string())),
        }
    }
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        "[a-z]{1,8}( [a-z]{1,8})?".prop_map(Action::Type),
        (0usize..16).prop_map(Action::Click),
    ]
}

fn arb_outcome() -> impl Strategy<Value = Outcome> {
    // Small label alphabet so labels collide across replies.
    let option = ("(More|Help|Fees|Back)", "[a-z]{1,6}");
    prop_oneof![
        3 => ("[A-Za-z ]{1,20}", proptest::collection::vec(option, 0..3))
            .prop_map(|(reply, options)| Outcome::Reply(reply, options)),
        1 => proptest::option::of("[a-z ]{0,12}").prop_map(Outcome::Service),
        1 => Just(Outcome::Transport),
    ]
}

// ============================================================================
// Helpers
// ============================================================================

fn started() -> Controller {
    let client =
        ScriptedClient::new().with_greeting("Hi, how can I help?", &["How do I apply?", "Fees?"]);
    let mut controller = SessionController::new(
        Arc::new(client),
        MemoryTokenStore::new(),
        WidgetConfig::default(),
    );
    tokio_test::block_on(controller.start()).expect("scripted start");
    controller
}

fn admit(controller: &mut Controller, action: &Action) -> Option<crate::PendingRequest> {
    match action {
        Action::Type(text) => controller.begin_query(text, false),
        Action::Click(index) => {
            let positions = controller.transcript().selectable_positions();
            if positions.is_empty() {
                return None;
            }
            controller.begin_activation(positions[index % positions.len()])
        }
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// N advancing actions followed by N back-navigations return to the
    /// initial state, visiting every intermediate state in reverse.
    #[test]
    fn history_symmetry(steps in proptest::collection::vec((arb_action(), arb_outcome()), 1..12)) {
        let mut controller = started();
        let mut before_each = Vec::new();

        for (action, outcome) in steps {
            let before = controller.state();
            if let Some(request) = admit(&mut controller, &action) {
                before_each.push(before);
                controller.complete(Completion { request, outcome: outcome.into_result() });
            }
        }

        prop_assert_eq!(controller.history_depth(), before_each.len());
        while let Some(expected) = before_each.pop() {
            prop_assert!(controller.go_back());
            prop_assert_eq!(controller.state(), expected);
        }
        prop_assert!(!controller.go_back());
    }

    /// No selectable key is ever admitted twice within a branch.
    #[test]
    fn guard_admits_each_key_once(
        steps in proptest::collection::vec((0usize..16, arb_outcome(), any::<bool>()), 1..24)
    ) {
        let mut controller = started();
        let mut admitted: HashMap<ActivationKey, usize> = HashMap::new();
        let mut pending = Vec::new();

        for (index, outcome, complete_now) in steps {
            let positions = controller.transcript().selectable_positions();
            let position = positions[index % positions.len()];
            let key = controller.transcript().activation_key(position).expect("selectable");

            if let Some(request) = controller.begin_activation(position) {
                *admitted.entry(key).or_default() += 1;
                pending.push((request, outcome));
            }
            // Leave some requests in flight so repeats arrive mid-request.
            if complete_now {
                for (request, outcome) in pending.drain(..) {
                    controller.complete(Completion { request, outcome: outcome.into_result() });
                }
            }
        }

        prop_assert!(admitted.values().all(|&count| count == 1));
        prop_assert_eq!(admitted.len(), controller.guard().len());
    }

    /// Activation sends the mapped query when the label is bound, the label otherwise.
    #[test]
    fn resolution_prefers_registry(label in "[A-Z][a-z]{1,6}", query in "[a-z]{1,6}") {
        let mut controller = started();
        let request = controller.begin_query("start", false).expect("admitted");
        controller.complete(Completion {
            request,
            outcome: Ok(BotReply {
                session_token: "s1".to_string(),
                reply: "ok".to_string(),
                options: vec![ReplyOption::new(label.clone(), query.clone())],
            }),
        });

        let bound = controller.transcript().len() - 1;
        let request = controller.begin_activation(bound).expect("bound option");
        prop_assert_eq!(request.query(), query.as_str());

        let request = controller.begin_activation(1).expect("default query");
        prop_assert_eq!(request.query(), "How do I apply?");
    }
}
