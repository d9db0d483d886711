use futures::StreamExt;
use ragchat_render::{drive, IncrementalRenderer, MessageState, RenderUpdate, TRANSPORT_FAILURE_MESSAGE};
use ragchat_stream::{parse_sse_stream, ChatStream, StreamError, StreamEvent};

const HELLO_STREAM: &str = concat!(
    "data: {\"type\":\"sources\",\"data\":{\"sources\":[{\"content\":\"A\",\"similarity\":0.9,\"metadata\":{}}],\"retrieval_count\":1}}\n\n",
    "data: {\"type\":\"text\",\"data\":\"Hel\"}\n\n",
    "data: {\"type\":\"text\",\"data\":\"lo\"}\n\n",
    "data: {\"type\":\"done\",\"data\":{}}\n\n",
);

fn sse(body: &'static str) -> ChatStream {
    let chunks = futures::stream::iter(vec![Ok::<_, String>(body.as_bytes().to_vec())]);
    ChatStream::new(parse_sse_stream(chunks))
}

#[tokio::test]
async fn test_hello_scenario() {
    let mut renderer = IncrementalRenderer::default();
    let mut view: Vec<RenderUpdate> = Vec::new();

    drive(sse(HELLO_STREAM), &mut renderer, &mut view).await;

    let message = renderer.message().unwrap();
    assert_eq!(message.sources().unwrap().len(), 1);
    assert_eq!(message.accumulated_text(), "Hello");
    assert_eq!(message.state(), MessageState::Finalized);
    assert_eq!(message.rendered(), "<p>Hello</p>");

    assert!(matches!(view[0], RenderUpdate::Started { .. }));
    match &view[1] {
        RenderUpdate::SourcesAttached { citations } => {
            assert_eq!(citations[0].label, "Source 1 (90.0%)")
        }
        other => panic!("Expected SourcesAttached, got {:?}", other),
    }
    assert_eq!(
        view.last(),
        Some(&RenderUpdate::Finalized {
            html: "<p>Hello</p>".to_string()
        })
    );
    assert_eq!(
        view.iter()
            .filter(|u| matches!(u, RenderUpdate::Started { .. }))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_rate_limited_scenario() {
    let mut renderer = IncrementalRenderer::default();
    let mut view: Vec<RenderUpdate> = Vec::new();

    drive(
        sse("data: {\"type\":\"error\",\"data\":{\"error\":\"rate limited\"}}\n\n"),
        &mut renderer,
        &mut view,
    )
    .await;

    let message = renderer.message().unwrap();
    assert_eq!(message.state(), MessageState::Aborted);
    assert_eq!(message.error(), Some("rate limited"));
    assert_eq!(
        view.last(),
        Some(&RenderUpdate::Aborted {
            message: "rate limited".to_string(),
            partial_text: None
        })
    );
}

#[test]
fn test_accumulated_text_independent_of_fragmentation() {
    let answer = "The quick 🦀 jumps over **lazy** 文字.";
    let chars: Vec<char> = answer.chars().collect();

    for size in 1..=chars.len() {
        let mut renderer = IncrementalRenderer::default();
        for piece in chars.chunks(size) {
            renderer.apply_event(StreamEvent::text(piece.iter().collect::<String>()));
        }
        renderer.apply_event(StreamEvent::Done);

        let message = renderer.message().unwrap();
        assert_eq!(message.accumulated_text(), answer, "fragment size {}", size);
    }
}

#[tokio::test]
async fn test_abrupt_end_is_treated_like_error() {
    let mut dropped = IncrementalRenderer::default();
    let mut dropped_view: Vec<RenderUpdate> = Vec::new();
    drive(
        ChatStream::from_events(vec![Ok(StreamEvent::text("Hel")), Ok(StreamEvent::text("lo"))]),
        &mut dropped,
        &mut dropped_view,
    )
    .await;

    let mut failed = IncrementalRenderer::default();
    let mut failed_view: Vec<RenderUpdate> = Vec::new();
    drive(
        ChatStream::from_events(vec![
            Ok(StreamEvent::text("Hel")),
            Ok(StreamEvent::text("lo")),
            Err(StreamError::Transport("connection reset".to_string())),
        ]),
        &mut failed,
        &mut failed_view,
    )
    .await;

    let expected = RenderUpdate::Aborted {
        message: TRANSPORT_FAILURE_MESSAGE.to_string(),
        partial_text: Some("Hello".to_string()),
    };
    assert_eq!(dropped_view.last(), Some(&expected));
    assert_eq!(failed_view.last(), Some(&expected));

    for renderer in [&dropped, &failed] {
        let message = renderer.message().unwrap();
        assert_eq!(message.state(), MessageState::Aborted);
        assert!(message.is_incomplete());
        assert_eq!(message.accumulated_text(), "Hello");
    }
}

#[tokio::test]
async fn test_truncated_stream_aborts() {
    let mut renderer = IncrementalRenderer::default();
    let mut view: Vec<RenderUpdate> = Vec::new();

    drive(
        sse("data: {\"type\":\"text\",\"data\":\"a\"}\n\ndata: {\"type\":\"te"),
        &mut renderer,
        &mut view,
    )
    .await;

    assert_eq!(renderer.message().unwrap().state(), MessageState::Aborted);
    assert!(matches!(view.last(), Some(RenderUpdate::Aborted { .. })));
}

#[tokio::test]
async fn test_malformed_frame_between_good_ones() {
    let mut renderer = IncrementalRenderer::default();
    let mut view: Vec<RenderUpdate> = Vec::new();

    drive(
        sse(concat!(
            "data: {\"type\":\"text\",\"data\":\"a\"}\n\n",
            "data: {not json}\n\n",
            "data: {\"type\":\"text\",\"data\":\"b\"}\n\n",
            "data: {\"type\":\"done\"}\n\n",
        )),
        &mut renderer,
        &mut view,
    )
    .await;

    let message = renderer.message().unwrap();
    assert_eq!(message.accumulated_text(), "ab");
    assert_eq!(message.state(), MessageState::Finalized);
}

#[tokio::test]
async fn test_cancelled_stream_reports_cancelled() {
    let stream = ChatStream::new(Box::pin(
        futures::stream::iter(vec![Ok(StreamEvent::text("partial"))])
            .chain(futures::stream::pending()),
    ));
    let handle = stream.cancel_handle();

    let mut renderer = IncrementalRenderer::default();
    let mut view: Vec<RenderUpdate> = Vec::new();

    tokio::spawn(async move {
        tokio::task::yield_now().await;
        handle.cancel();
    });
    drive(stream, &mut renderer, &mut view).await;

    assert_eq!(view.last(), Some(&RenderUpdate::Cancelled));
    let message = renderer.message().unwrap();
    assert_eq!(message.state(), MessageState::Aborted);
    assert_eq!(message.error(), None);
}
