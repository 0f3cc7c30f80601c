// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Two daemons on loopback sockets, talking over the real HTTP transport.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use tempfile::TempDir;
use tricarb_common_config::StateStore;
use tricarb_daemon::remote::rpc_url;
use tricarb_daemon::testing::daemon_with;
use tricarb_daemon::{create_router, HttpMeshRemote, MeshDaemon};
use tricarb_wgmesh_backend::testing::RecordingDriver;
use tricarb_wgmesh_common::protocol::{
	routes, Ack, ErrorReply, ServerInfo, ServerStartReply, StatusReply,
};
use tricarb_wgmesh_common::ErrorKind;

struct Node {
	_dir: TempDir,
	daemon: Arc<MeshDaemon>,
	driver: Arc<RecordingDriver>,
	port: u16,
}

async fn spawn_node() -> Node {
	let dir = TempDir::new().unwrap();
	let driver = Arc::new(RecordingDriver::new());
	let remote = Arc::new(HttpMeshRemote::new(Duration::from_secs(2)).unwrap());
	let daemon = daemon_with(dir.path(), StateStore::in_memory(), driver.clone(), remote).unwrap();

	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let port = listener.local_addr().unwrap().port();
	let app = create_router(daemon.clone());
	tokio::spawn(async move {
		axum::serve(
			listener,
			app.into_make_service_with_connect_info::<SocketAddr>(),
		)
		.await
		.unwrap();
	});

	Node {
		_dir: dir,
		daemon,
		driver,
		port,
	}
}

fn url(node: &Node, route: &str) -> String {
	rpc_url("127.0.0.1", node.port, route)
}

async fn peer_count(node: &Node) -> usize {
	node.daemon.lock().await.backend.peers().len()
}

#[tokio::test]
async fn attach_and_detach_over_http() {
	let server = spawn_node().await;
	let client = spawn_node().await;
	let http = reqwest::Client::new();

	let start: ServerStartReply = http
		.post(url(&server, routes::SERVER_START))
		.send()
		.await
		.unwrap()
		.error_for_status()
		.unwrap()
		.json()
		.await
		.unwrap();
	let before = peer_count(&server).await;

	let info = ServerInfo {
		host: "127.0.0.1".to_string(),
		port: server.port,
		access_code: start.access_code.clone(),
	};
	let ack: Ack = http
		.post(url(&client, routes::CLIENT_ATTACH))
		.json(&info)
		.send()
		.await
		.unwrap()
		.error_for_status()
		.unwrap()
		.json()
		.await
		.unwrap();
	assert!(ack.ok);

	assert_eq!(peer_count(&server).await, before + 1);
	let allowed = server.daemon.lock().await.backend.peers()[0]
		.allowed_ips
		.clone();
	let client_address = client
		.daemon
		.lock()
		.await
		.backend
		.interface()
		.unwrap()
		.address
		.clone();
	let host = client_address.split('/').next().unwrap();
	assert_eq!(allowed, format!("{host}/32"));
	assert!(client_address.ends_with("/24"));

	let status: StatusReply = http
		.get(url(&client, routes::STATUS))
		.send()
		.await
		.unwrap()
		.json()
		.await
		.unwrap();
	assert!(status.config.contains(&format!("Endpoint = 127.0.0.1:{}", start.listen_port)));
	assert!(!status.config.contains(
		&client
			.daemon
			.lock()
			.await
			.backend
			.interface()
			.unwrap()
			.private_key
	));

	http.post(url(&client, routes::CLIENT_DETACH))
		.json(&info)
		.send()
		.await
		.unwrap()
		.error_for_status()
		.unwrap();
	assert_eq!(peer_count(&server).await, before);
	assert_eq!(peer_count(&client).await, 0);
	assert!(server.driver.calls().len() >= 3);
}

#[tokio::test]
async fn wrong_code_is_relayed_to_controller() {
	let server = spawn_node().await;
	let client = spawn_node().await;
	let http = reqwest::Client::new();

	http.post(url(&server, routes::SERVER_START))
		.send()
		.await
		.unwrap()
		.error_for_status()
		.unwrap();

	let info = ServerInfo {
		host: "127.0.0.1".to_string(),
		port: server.port,
		access_code: "not-the-code".to_string(),
	};
	let resp = http
		.post(url(&client, routes::CLIENT_ATTACH))
		.json(&info)
		.send()
		.await
		.unwrap();
	assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
	let err: ErrorReply = resp.json().await.unwrap();
	assert_eq!(err.error, ErrorKind::Auth);
	assert_eq!(err.message, "invalid access code");

	assert_eq!(peer_count(&server).await, 0);
	assert!(client.driver.calls().is_empty());
}

#[tokio::test]
async fn pool_exhaustion_reaches_the_client() {
	let server = spawn_node().await;
	let http = reqwest::Client::new();

	http.post(url(&server, routes::SET_CIDR))
		.json(&serde_json::json!({ "value": "10.0.0.0/30" }))
		.send()
		.await
		.unwrap()
		.error_for_status()
		.unwrap();
	let start: ServerStartReply = http
		.post(url(&server, routes::SERVER_START))
		.send()
		.await
		.unwrap()
		.json()
		.await
		.unwrap();
	assert!(start.address.ends_with("/30"));

	let first = spawn_node().await;
	let second = spawn_node().await;
	let info = ServerInfo {
		host: "127.0.0.1".to_string(),
		port: server.port,
		access_code: start.access_code,
	};

	let ok = http
		.post(url(&first, routes::CLIENT_ATTACH))
		.json(&info)
		.send()
		.await
		.unwrap();
	assert_eq!(ok.status(), StatusCode::OK);

	let resp = http
		.post(url(&second, routes::CLIENT_ATTACH))
		.json(&info)
		.send()
		.await
		.unwrap();
	assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
	let err: ErrorReply = resp.json().await.unwrap();
	assert_eq!(err.error, ErrorKind::PoolExhausted);
	assert!(second.daemon.lock().await.backend.public_key().is_none());
}
