use crate::relay::test_helpers::{create_test_relay, link};
use crate::relay::{BatchPrompt, SessionAdvance};
use crate::types::RequesterId;

const REQUESTER: RequesterId = RequesterId(1);

#[tokio::test]
async fn happy_path_collects_link_then_count_then_launches() {
    let (relay, _store, _reporter, _temp) = create_test_relay().await;

    assert_eq!(relay.begin_batch(REQUESTER), BatchPrompt::AskStartLink);

    let advance = relay.advance_batch(REQUESTER, &link(100)).unwrap();
    assert_eq!(advance, SessionAdvance::Prompt(BatchPrompt::AskCount));

    let advance = relay.advance_batch(REQUESTER, "25").unwrap();
    assert_eq!(
        advance,
        SessionAdvance::Launch {
            start_reference: link(100),
            count: 25,
        }
    );
    assert!(
        !relay.has_batch_session(REQUESTER),
        "the session is destroyed when the batch launches"
    );
}

#[tokio::test]
async fn invalid_link_reprompts_and_keeps_the_session() {
    let (relay, _store, _reporter, _temp) = create_test_relay().await;
    relay.begin_batch(REQUESTER);

    let advance = relay.advance_batch(REQUESTER, "not a link").unwrap();
    assert_eq!(advance, SessionAdvance::Prompt(BatchPrompt::InvalidLink));
    assert!(relay.has_batch_session(REQUESTER));

    // A valid link afterwards still works
    let advance = relay.advance_batch(REQUESTER, &link(5)).unwrap();
    assert_eq!(advance, SessionAdvance::Prompt(BatchPrompt::AskCount));
}

#[tokio::test]
async fn invalid_count_reprompts() {
    let (relay, _store, _reporter, _temp) = create_test_relay().await;
    relay.begin_batch(REQUESTER);
    relay.advance_batch(REQUESTER, &link(5)).unwrap();

    for bad in ["abc", "-3", "0", ""] {
        let advance = relay.advance_batch(REQUESTER, bad).unwrap();
        assert_eq!(
            advance,
            SessionAdvance::Prompt(BatchPrompt::InvalidCount),
            "input {bad:?} must re-prompt"
        );
        assert!(relay.has_batch_session(REQUESTER));
    }
}

#[tokio::test]
async fn input_without_a_session_is_ignored() {
    let (relay, _store, _reporter, _temp) = create_test_relay().await;
    assert!(relay.advance_batch(REQUESTER, "anything").is_none());
}

#[tokio::test]
async fn re_entering_batch_mode_replaces_the_session() {
    let (relay, _store, _reporter, _temp) = create_test_relay().await;
    relay.begin_batch(REQUESTER);
    relay.advance_batch(REQUESTER, &link(5)).unwrap();

    // Start over: the session must be back at the link step
    relay.begin_batch(REQUESTER);
    let advance = relay.advance_batch(REQUESTER, "7").unwrap();
    assert_eq!(
        advance,
        SessionAdvance::Prompt(BatchPrompt::InvalidLink),
        "after re-entry the session awaits a link again, so a bare count is invalid"
    );
}

#[tokio::test]
async fn sessions_are_isolated_per_requester() {
    let (relay, _store, _reporter, _temp) = create_test_relay().await;
    let other = RequesterId(2);

    relay.begin_batch(REQUESTER);
    assert!(relay.advance_batch(other, &link(5)).is_none());
    assert!(relay.has_batch_session(REQUESTER));
    assert!(!relay.has_batch_session(other));
}

#[tokio::test]
async fn cancel_session_removes_it() {
    let (relay, _store, _reporter, _temp) = create_test_relay().await;
    relay.begin_batch(REQUESTER);

    assert!(relay.cancel_batch_session(REQUESTER));
    assert!(!relay.has_batch_session(REQUESTER));
    assert!(
        !relay.cancel_batch_session(REQUESTER),
        "cancelling an absent session reports false"
    );
}

#[tokio::test]
async fn launched_session_feeds_a_runnable_batch() {
    let (relay, store, _reporter, _temp) = create_test_relay().await;
    store.add_media(100);
    store.set_relay(100, crate::relay::test_helpers::RelayScript::Relayed);

    relay.begin_batch(REQUESTER);
    relay.advance_batch(REQUESTER, &link(100)).unwrap();
    let SessionAdvance::Launch {
        start_reference,
        count,
    } = relay.advance_batch(REQUESTER, "1").unwrap()
    else {
        panic!("expected Launch");
    };

    let report = relay
        .submit_batch(crate::relay::BatchRequest {
            start_reference,
            count,
            destination: crate::types::ChatRef::Internal(42),
            tier: crate::types::AccountTier::Standard,
        })
        .unwrap()
        .join()
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
}
