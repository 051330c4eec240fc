mod common;

use anyhow::Result;
use common::CountingClock;
use pingback::descriptor::{build, DEFAULT_WAIT};
use pingback::options::{continue_with, Continuation, Method, ParamValue, RequestOptions};
use pingback::ControllerError;
use serde_json::json;
use std::time::Duration;

#[test]
fn test_defaults_when_nothing_configured() -> Result<()> {
    let clock = CountingClock::new(1000);
    let instance = RequestOptions::new().with_url("/session");

    let descriptor = build(&instance, &RequestOptions::new(), clock.as_ref())?;

    assert_eq!(descriptor.request.url, "/session");
    assert_eq!(descriptor.request.method, Method::Get);
    assert_eq!(descriptor.wait, DEFAULT_WAIT);
    assert_eq!(descriptor.wait, Duration::from_millis(150));
    assert_eq!(descriptor.created_at, 1000);
    assert_eq!(descriptor.request.params.len(), 1);
    assert_eq!(descriptor.request.params["createdAt"], ParamValue::Int(1000));
    assert_eq!(
        (descriptor.continuation)(&json!({"wait": 10})),
        Continuation::Finish
    );
    Ok(())
}

#[test]
fn test_override_beats_instance_beats_default() -> Result<()> {
    let clock = CountingClock::new(1000);
    let instance = RequestOptions::new()
        .with_url("/instance")
        .with_method(Method::Put)
        .with_wait(Duration::from_millis(400));

    let inherited = build(&instance, &RequestOptions::new(), clock.as_ref())?;
    assert_eq!(inherited.request.url, "/instance");
    assert_eq!(inherited.request.method, Method::Put);
    assert_eq!(inherited.wait, Duration::from_millis(400));

    let overrides = RequestOptions::new()
        .with_url("/override")
        .with_method(Method::Delete)
        .with_wait(Duration::from_millis(20))
        .with_continuation(continue_with(|_| Continuation::Pending));
    let overridden = build(&instance, &overrides, clock.as_ref())?;
    assert_eq!(overridden.request.url, "/override");
    assert_eq!(overridden.request.method, Method::Delete);
    assert_eq!(overridden.wait, Duration::from_millis(20));
    assert_eq!((overridden.continuation)(&json!({})), Continuation::Pending);
    Ok(())
}

#[test]
fn test_params_union_with_override_winning() -> Result<()> {
    let clock = CountingClock::new(1000);
    let instance = RequestOptions::new()
        .with_url("/e")
        .with_param("a", 1)
        .with_param("shared", "instance");
    let overrides = RequestOptions::new()
        .with_param("b", true)
        .with_param("shared", "override");

    let descriptor = build(&instance, &overrides, clock.as_ref())?;
    let params = &descriptor.request.params;

    assert_eq!(params.len(), 4);
    assert_eq!(params["a"], ParamValue::Int(1));
    assert_eq!(params["b"], ParamValue::Bool(true));
    assert_eq!(params["shared"], ParamValue::Str("override".to_string()));
    assert_eq!(params["createdAt"], ParamValue::Int(1000));
    Ok(())
}

#[test]
fn test_caller_created_at_wins() -> Result<()> {
    let clock = CountingClock::new(1000);
    let instance = RequestOptions::new().with_url("/e");
    let overrides = RequestOptions::new().with_param("createdAt", "yesterday");

    let descriptor = build(&instance, &overrides, clock.as_ref())?;

    assert_eq!(
        descriptor.request.params["createdAt"],
        ParamValue::Str("yesterday".to_string())
    );
    assert_eq!(descriptor.created_at, 1000);
    Ok(())
}

#[test]
fn test_clock_read_once_per_build() -> Result<()> {
    let clock = CountingClock::new(1000);
    let instance = RequestOptions::new().with_url("/e");

    let first = build(&instance, &RequestOptions::new(), clock.as_ref())?;
    let second = build(&instance, &RequestOptions::new(), clock.as_ref())?;

    assert_eq!(first.created_at, 1000);
    assert_eq!(second.created_at, 1001);
    assert_eq!(clock.reads(), 2);
    Ok(())
}

#[test]
fn test_missing_url_is_rejected_without_reading_clock() {
    let clock = CountingClock::new(1000);
    let instance = RequestOptions::new().with_param("a", 1);

    let result = build(&instance, &RequestOptions::new(), clock.as_ref());

    assert!(matches!(result, Err(ControllerError::MissingUrl)));
    assert_eq!(clock.reads(), 0);
}

#[test]
fn test_blank_url_counts_as_missing() {
    let clock = CountingClock::new(1000);

    let empty = build(
        &RequestOptions::new(),
        &RequestOptions::new().with_url(""),
        clock.as_ref(),
    );
    let blank = build(
        &RequestOptions::new().with_url("   "),
        &RequestOptions::new(),
        clock.as_ref(),
    );

    assert!(matches!(empty, Err(ControllerError::MissingUrl)));
    assert!(matches!(blank, Err(ControllerError::MissingUrl)));
    assert_eq!(
        ControllerError::MissingUrl.to_string(),
        "You must define url for the request to be sent"
    );
}

#[test]
fn test_blank_override_url_falls_back_to_instance() -> Result<()> {
    let clock = CountingClock::new(1000);
    let instance = RequestOptions::new().with_url("/e");

    let empty = build(&instance, &RequestOptions::new().with_url(""), clock.as_ref())?;
    let blank = build(&instance, &RequestOptions::new().with_url(" \t"), clock.as_ref())?;

    assert_eq!(empty.request.url, "/e");
    assert_eq!(blank.request.url, "/e");
    Ok(())
}

#[test]
fn test_build_leaves_inputs_untouched() -> Result<()> {
    let clock = CountingClock::new(1000);
    let instance = RequestOptions::new().with_url("/e").with_param("a", 1);
    let overrides = RequestOptions::new().with_param("b", 2);

    build(&instance, &overrides, clock.as_ref())?;

    assert_eq!(instance.params.len(), 1);
    assert_eq!(overrides.params.len(), 1);
    assert!(!instance.params.contains_key("createdAt"));
    Ok(())
}
