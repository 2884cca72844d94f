mod common;

use common::*;
use http::Method;
use mainload::http::LoadRequest;
use mainload::loader::task::TransportCommand;
use mainload::loader::LoaderConfig;
use mainload::policy::{PolicyClass, PolicyDecision, PolicySubject};
use mainload::{LoadError, LoadState, NetError};

const START: &str = "https://a.example/start";
const NEXT: &str = "https://a.example/next";

#[test]
fn test_redirect_requests_navigation_policy_again() {
    let mut h = Harness::new();
    h.start_approved(START);

    let next = h
        .loader
        .on_will_send_request(request(NEXT), redirect(START, 302, NEXT));
    assert_eq!(next.unwrap().url().as_str(), NEXT);
    assert_eq!(h.loader.state(), LoadState::AwaitingNavigationPolicy);
    assert_eq!(h.loader.redirect_count(), 1);

    let checks = h.checks();
    assert_eq!(checks.len(), 2);
    match &checks[1].subject {
        PolicySubject::Navigation(req) => assert_eq!(req.url().as_str(), NEXT),
        other => panic!("Expected navigation check, got {:?}", other),
    }

    // Only the approved target is dispatched.
    assert_eq!(h.dispatched_urls(), vec![START]);
    h.decide_navigation(PolicyDecision::Continue);
    assert_eq!(h.dispatched_urls(), vec![START, NEXT]);

    h.loader.on_response_received(response(NEXT, "text/html"));
    h.decide_content(PolicyDecision::Continue);
    h.loader.on_finished();

    assert_eq!(
        seen(&h.owner_events()),
        vec![Seen::Response(NEXT.to_string()), Seen::Finished]
    );
    assert_eq!(h.loader.initial_request().unwrap().url().as_str(), START);
    assert_eq!(h.loader.current_request().unwrap().url().as_str(), NEXT);
}

#[test]
fn test_redirect_cancelled_by_navigation_policy() {
    let mut h = Harness::new();
    h.start_approved(START);
    h.loader
        .on_will_send_request(request(NEXT), redirect(START, 301, NEXT));
    h.decide_navigation(PolicyDecision::Cancel);

    assert!(h.owner_events().is_empty());
    assert_eq!(h.loader.state(), LoadState::Cancelled);
    assert_eq!(h.dispatched_urls(), vec![START]);
}

#[test]
fn test_decision_for_previous_hop_is_stale() {
    let mut h = Harness::new();
    h.loader.start(request(START)).unwrap();
    let first = h.last_token(PolicyClass::Navigation);
    h.loader.resolve(first, PolicyDecision::Continue);

    h.loader
        .on_will_send_request(request(NEXT), redirect(START, 302, NEXT));
    let second = h.last_token(PolicyClass::Navigation);
    assert_ne!(first, second);
    assert!(second.generation() > first.generation());

    h.loader.resolve(first, PolicyDecision::Cancel);
    assert_eq!(h.loader.state(), LoadState::AwaitingNavigationPolicy);

    h.loader.resolve(second, PolicyDecision::Continue);
    assert_eq!(h.loader.state(), LoadState::Loading);
}

#[test]
fn test_redirect_limit() {
    let config = LoaderConfig {
        redirect_limit: 2,
        ..Default::default()
    };
    let mut h = Harness::with_config(config);
    h.start_approved("https://a.example/0");

    for i in 1..=2 {
        let from = format!("https://a.example/{}", i - 1);
        let to = format!("https://a.example/{}", i);
        let next = h
            .loader
            .on_will_send_request(request(&to), redirect(&from, 302, &to));
        assert!(next.is_some());
        h.decide_navigation(PolicyDecision::Continue);
    }

    let next = h.loader.on_will_send_request(
        request("https://a.example/3"),
        redirect("https://a.example/2", 302, "https://a.example/3"),
    );
    assert!(next.is_none());
    assert_eq!(
        seen(&h.owner_events()),
        vec![Seen::Failed(LoadError::TransportFailure(NetError::TooManyRedirects))]
    );
    assert_eq!(h.loader.state(), LoadState::Failed);
}

#[test]
fn test_redirect_to_disallowed_scheme_is_unsafe() {
    let mut h = Harness::new();
    h.start_approved(START);
    let next = h.loader.on_will_send_request(
        request("ftp://files.example/x"),
        redirect(START, 302, "ftp://files.example/x"),
    );

    assert!(next.is_none());
    assert_eq!(
        seen(&h.owner_events()),
        vec![Seen::Failed(LoadError::TransportFailure(NetError::UnsafeRedirect))]
    );
}

#[test]
fn test_see_other_after_post_becomes_get() {
    let mut h = Harness::new();
    h.loader
        .start(LoadRequest::post(url(START), "a=1"))
        .unwrap();
    h.decide_navigation(PolicyDecision::Continue);

    let next = h
        .loader
        .on_will_send_request(request(NEXT), redirect(START, 303, NEXT))
        .unwrap();
    assert_eq!(next.method(), Method::GET);
    assert!(next.body().is_none());
    // Still a resubmission of the original form post.
    assert!(h.loader.is_post_or_redirect_after_post(&next, None));
}

#[test]
fn test_resubmission_detection_by_status() {
    let mut h = Harness::new();
    h.loader
        .start(LoadRequest::post(url(START), "a=1"))
        .unwrap();
    h.decide_navigation(PolicyDecision::Continue);

    let get = request(NEXT);
    for status in [301, 302, 303, 307] {
        let resp = redirect(START, status, NEXT);
        assert!(
            h.loader.is_post_or_redirect_after_post(&get, Some(&resp)),
            "status {}",
            status
        );
    }
    let resp = redirect(START, 308, NEXT);
    assert!(!h.loader.is_post_or_redirect_after_post(&get, Some(&resp)));
}

#[test]
fn test_get_redirect_is_not_resubmission() {
    let mut h = Harness::new();
    h.start_approved(START);
    let next = h
        .loader
        .on_will_send_request(request(NEXT), redirect(START, 302, NEXT))
        .unwrap();
    assert!(!h.loader.is_post_or_redirect_after_post(&next, None));
}

#[test]
fn test_redirect_keeps_transport_headers() {
    let mut h = Harness::new();
    h.start_approved(START);

    let proposed = request(NEXT)
        .with_header("referer", START)
        .unwrap()
        .with_header("x-transport", "1")
        .unwrap();
    let next = h
        .loader
        .on_will_send_request(proposed, redirect(START, 302, NEXT))
        .unwrap();
    assert_eq!(next.headers()["x-transport"], "1");
    assert_eq!(next.headers()["referer"], START);

    // The approved request is what reaches the transport.
    h.decide_navigation(PolicyDecision::Continue);
    match h.transport_commands().last() {
        Some(TransportCommand::Dispatch(req)) => {
            assert!(req.headers().contains_key("x-transport"))
        }
        other => panic!("Expected dispatch, got {:?}", other),
    }
}

#[test]
fn test_temporary_redirect_keeps_post() {
    let mut h = Harness::new();
    h.loader
        .start(LoadRequest::post(url(START), "a=1"))
        .unwrap();
    h.decide_navigation(PolicyDecision::Continue);

    // The transport proposes a plain GET; method and body carry over.
    let redirect_response = redirect(START, 307, NEXT);
    let next = h
        .loader
        .on_will_send_request(request(NEXT), redirect_response.clone())
        .unwrap();
    assert_eq!(next.method(), Method::POST);
    assert_eq!(next.body().map(|b| b.as_ref()), Some(&b"a=1"[..]));
    assert!(h
        .loader
        .is_post_or_redirect_after_post(&next, Some(&redirect_response)));

    h.decide_navigation(PolicyDecision::Continue);
    let get = request("https://a.example/other");
    assert!(h.loader.is_post_or_redirect_after_post(&get, None));
}

#[test]
fn test_cross_origin_redirect_drops_credentials() {
    let mut h = Harness::new();
    let start = request(START)
        .with_header("authorization", "Basic dXNlcjpwYXNz")
        .unwrap();
    h.loader.start(start).unwrap();
    h.decide_navigation(PolicyDecision::Continue);

    let target = "https://b.example/";
    let proposed = request(target)
        .with_header("authorization", "Basic dXNlcjpwYXNz")
        .unwrap();
    let next = h
        .loader
        .on_will_send_request(proposed, redirect(START, 302, target))
        .unwrap();
    assert!(next.headers().get("authorization").is_none());
}

#[test]
fn test_redirect_discards_buffered_response_state() {
    let mut h = Harness::new();
    h.start_approved(START);
    let before = h.loader.delivery_generation();

    h.loader
        .on_will_send_request(request(NEXT), redirect(START, 302, NEXT));
    assert!(h.loader.delivery_generation() > before);
    assert!(h.loader.response().is_none());
}
