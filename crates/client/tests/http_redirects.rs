//! Redirect behavior of the real HTTP transport against a loopback server.

use std::time::Duration;

use axum::Router;
use axum::response::Redirect;
use axum::routing::get;
use url::Url;

use marginalia::{
	Error, EventSink, HttpTransport, Method, RedirectFollower, ServiceEvent, TransportRequest,
};

const SERVICE_DOC: &str = r#"<services version="0.7">
  <service name="Loopback">
    <resource type="documents" href="http://127.0.0.1/documents"/>
  </service>
</services>"#;

async fn serve(app: Router) -> String {
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});
	format!("http://{addr}")
}

fn transport() -> HttpTransport {
	HttpTransport::new(Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn a_short_redirect_chain_resolves_to_the_terminal_reply() -> anyhow::Result<()> {
	let app = Router::new()
		.route("/start", get(|| async { Redirect::temporary("/hop1") }))
		.route("/hop1", get(|| async { Redirect::temporary("/hop2") }))
		.route("/hop2", get(|| async { Redirect::temporary("/end") }))
		.route("/end", get(|| async { SERVICE_DOC }));
	let base = serve(app).await;

	let transport = transport();
	let events = EventSink::new();
	let mut rx = events.subscribe();
	let follower = RedirectFollower::new(&transport, &events);

	let url = Url::parse(&format!("{base}/start"))?;
	let reply = follower.send(Method::Get, TransportRequest::new(url)).await?;

	assert_eq!(reply.status, 200);
	assert!(reply.body.contains("Loopback"));

	// Exactly one settled event for the whole chain.
	assert_eq!(rx.try_recv()?, ServiceEvent::RequestSettled);
	assert!(rx.try_recv().is_err());
	Ok(())
}

#[tokio::test]
async fn a_chain_of_five_redirects_is_abandoned() {
	let app = Router::new()
		.route("/r0", get(|| async { Redirect::temporary("/r1") }))
		.route("/r1", get(|| async { Redirect::temporary("/r2") }))
		.route("/r2", get(|| async { Redirect::temporary("/r3") }))
		.route("/r3", get(|| async { Redirect::temporary("/r4") }))
		.route("/r4", get(|| async { Redirect::temporary("/r5") }))
		.route("/r5", get(|| async { SERVICE_DOC }));
	let base = serve(app).await;

	let transport = transport();
	let events = EventSink::new();
	let follower = RedirectFollower::new(&transport, &events);

	let url = Url::parse(&format!("{base}/r0")).unwrap();
	let err = follower
		.send(Method::Get, TransportRequest::new(url))
		.await
		.unwrap_err();

	assert_eq!(
		err,
		Error::ServiceServerInaccessible(
			"Cannot resolve service URL (too many redirects)".to_string()
		)
	);
}

#[tokio::test]
async fn the_transport_does_not_follow_redirects_itself() {
	let app = Router::new()
		.route("/start", get(|| async { Redirect::temporary("/end") }))
		.route("/end", get(|| async { SERVICE_DOC }));
	let base = serve(app).await;

	use marginalia::Transport;
	let transport = transport();
	let url = Url::parse(&format!("{base}/start")).unwrap();
	let reply = transport
		.send(Method::Get, TransportRequest::new(url))
		.await
		.unwrap();

	assert_eq!(reply.status, 307);
	assert_eq!(reply.redirect_target.as_deref(), Some("/end"));
}

#[tokio::test]
async fn connection_failures_are_reported_as_inaccessible() {
	// Nothing listens on this port.
	let transport = transport();
	let events = EventSink::new();
	let follower = RedirectFollower::new(&transport, &events);

	let url = Url::parse("http://127.0.0.1:9/unreachable").unwrap();
	let err = follower
		.send(Method::Get, TransportRequest::new(url))
		.await
		.unwrap_err();

	assert_eq!(
		err,
		Error::ServiceServerInaccessible("Cannot resolve service URL".to_string())
	);
}
