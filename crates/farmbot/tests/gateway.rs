//! End-to-end tests against an in-process mock gateway: a real TCP
//! listener speaking the binary envelope protocol over WebSocket, with
//! per-scenario behavior.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use prost::Message as _;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{accept_async, WebSocketStream};

use farmbot::config::BotConfig;
use farmbot::instance::Instance;
use farmbot::logger::Logger;
use farmbot::model::{Account, LogLevel};
use farmbot::net::{DisconnectReason, Net, NetTiming, RpcError, SessionState};

use farmproto::{gate, item, user};

type Ws = WebSocketStream<TcpStream>;

const TEST_GID: i64 = 42;

fn fast_timing() -> NetTiming {
    NetTiming {
        handshake_timeout: Duration::from_secs(5),
        write_timeout: Duration::from_secs(5),
        read_timeout: Duration::from_secs(5),
        ping_period: Duration::from_secs(60),
        request_timeout: Duration::from_millis(100),
        login_timeout: Duration::from_millis(300),
        heartbeat_period: Duration::from_secs(60),
        heartbeat_stale_after: Duration::from_secs(60),
        reconnect_backoff_init: Duration::from_millis(50),
        reconnect_backoff_max: Duration::from_secs(1),
    }
}

/// Bind a mock gateway; every accepted connection runs `handler` with its
/// 1-based connection ordinal. Returns the address and the accept counter.
async fn serve<F, Fut>(handler: F) -> (SocketAddr, Arc<AtomicUsize>)
where
    F: Fn(Ws, usize) -> Fut + Send + Sync + Clone + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let conns = Arc::new(AtomicUsize::new(0));
    let counter = conns.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let ordinal = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let handler = handler.clone();
            tokio::spawn(async move {
                let Ok(ws) = accept_async(stream).await else {
                    return;
                };
                handler(ws, ordinal).await;
            });
        }
    });
    (addr, conns)
}

async fn read_request(ws: &mut Ws) -> Option<(gate::Meta, Vec<u8>)> {
    while let Some(msg) = ws.next().await {
        let Ok(msg) = msg else { return None };
        match msg {
            WsMessage::Binary(data) => {
                let env = gate::Message::decode(data.as_slice()).ok()?;
                return Some((env.meta?, env.body));
            }
            WsMessage::Close(_) => return None,
            _ => {}
        }
    }
    None
}

fn response_frame(req: &gate::Meta, body: Vec<u8>, error_code: i64, error_message: &str) -> WsMessage {
    let msg = gate::Message {
        meta: Some(gate::Meta {
            service_name: req.service_name.clone(),
            method_name: req.method_name.clone(),
            message_type: gate::MESSAGE_TYPE_RESPONSE,
            client_seq: req.client_seq,
            server_seq: req.client_seq,
            error_code,
            error_message: error_message.to_string(),
        }),
        body,
    };
    WsMessage::Binary(msg.encode_to_vec())
}

fn notify_frame(msg_type: &str, inner: Vec<u8>) -> WsMessage {
    let event = gate::EventMessage {
        message_type: msg_type.to_string(),
        body: inner,
    };
    let msg = gate::Message {
        meta: Some(gate::Meta {
            message_type: gate::MESSAGE_TYPE_NOTIFY,
            ..Default::default()
        }),
        body: event.encode_to_vec(),
    };
    WsMessage::Binary(msg.encode_to_vec())
}

fn login_ok_body() -> Vec<u8> {
    user::LoginReply {
        basic: Some(user::UserBasic {
            gid: TEST_GID,
            name: "测试号".to_string(),
            level: 10,
            exp: 100,
            gold: 5000,
        }),
    }
    .encode_to_vec()
}

async fn connect(addr: SocketAddr, timing: NetTiming) -> (Arc<Net>, Arc<Logger>) {
    let logger = Logger::new(1, None);
    let net = Net::connect(
        &format!("ws://{addr}/prod/ws"),
        "qq",
        "1.0.0",
        "testcode",
        logger.clone(),
        timing,
        None,
    )
    .await
    .expect("connect mock gateway");
    (net, logger)
}

fn test_account() -> Account {
    Account {
        id: 7,
        user_id: 1,
        name: "bot7".to_string(),
        platform: "qq".to_string(),
        code: "testcode".to_string(),
        auto_start: false,
        farm_interval: 10,
        friend_interval: 10,
        enable_steal: false,
        force_lowest: false,
        enable_harvest: true,
        enable_plant: true,
        enable_sell: false,
        enable_weed: true,
        enable_bug: true,
        enable_water: true,
        enable_remove_dead: true,
        enable_upgrade_land: false,
        enable_help_friend: false,
        enable_claim_task: false,
        plant_crop_id: 0,
        sell_crop_ids: String::new(),
        steal_crop_ids: String::new(),
        auto_use_fertilizer: false,
        auto_buy_fertilizer: false,
        fertilizer_target_count: 0,
        fertilizer_buy_daily_limit: 0,
        created_at: None,
        updated_at: None,
    }
}

fn test_instance(addr: SocketAddr, timing: NetTiming) -> Arc<Instance> {
    let account = test_account();
    let cfg = BotConfig::from_account(&account, &format!("ws://{addr}/prod/ws"), "1.0.0");
    let logger = Logger::new(account.id, None);
    Instance::new(
        account,
        cfg,
        logger,
        Arc::new(farmbot::catalog::GameCatalog::empty()),
        timing,
    )
}

#[tokio::test]
async fn happy_rpc_resolves_with_matching_seq() {
    let (addr, _) = serve(|mut ws, _| async move {
        while let Some((meta, body)) = read_request(&mut ws).await {
            assert_eq!(meta.message_type, gate::MESSAGE_TYPE_REQUEST);
            assert_eq!(body, vec![0x01]);
            let _ = ws
                .send(response_frame(&meta, vec![0xAA, 0xBB], 0, ""))
                .await;
        }
    })
    .await;

    let (net, _) = connect(addr, fast_timing()).await;
    let reply = tokio::time::timeout(
        Duration::from_millis(200),
        net.send_request("X.Y", "M", vec![0x01]),
    )
    .await
    .expect("reply within 200ms")
    .expect("rpc ok");
    assert_eq!(reply, vec![0xAA, 0xBB]);
    assert_eq!(net.pending_count(), 0);
}

#[tokio::test]
async fn unanswered_rpc_times_out() {
    let (addr, _) = serve(|mut ws, _| async move {
        // Swallow everything.
        while read_request(&mut ws).await.is_some() {}
    })
    .await;

    let (net, _) = connect(addr, fast_timing()).await;
    let err = tokio::time::timeout(
        Duration::from_millis(150),
        net.send_request("X.Y", "M", vec![0x01]),
    )
    .await
    .expect("resolved within 150ms")
    .expect_err("must time out");
    assert!(err.is_timeout(), "got {err}");
    assert_eq!(net.pending_count(), 0);
    assert!(!net.is_closed());
}

#[tokio::test]
async fn server_error_is_surfaced_and_session_stays_active() {
    let (addr, _) = serve(|mut ws, _| async move {
        while let Some((meta, _)) = read_request(&mut ws).await {
            let frame = match meta.method_name.as_str() {
                "Login" => response_frame(&meta, login_ok_body(), 0, ""),
                _ => response_frame(&meta, Vec::new(), 42, "boom"),
            };
            let _ = ws.send(frame).await;
        }
    })
    .await;

    let (net, _) = connect(addr, fast_timing()).await;
    net.login().await.expect("login");
    assert_eq!(net.session_state(), SessionState::Active);

    let err = net
        .send_request("X.Y", "M", vec![0x01])
        .await
        .expect_err("server error expected");
    match err {
        RpcError::Server(e) => {
            assert_eq!(e.service, "X.Y");
            assert_eq!(e.method, "M");
            assert_eq!(e.code, 42);
            assert_eq!(e.message, "boom");
        }
        other => panic!("expected server error, got {other}"),
    }
    assert_eq!(net.session_state(), SessionState::Active);
    assert!(!net.is_closed());
}

#[tokio::test]
async fn kickout_fails_inflight_rpc_and_records_reason() {
    let (addr, _) = serve(|mut ws, _| async move {
        while let Some((meta, _)) = read_request(&mut ws).await {
            match meta.method_name.as_str() {
                "Login" => {
                    let _ = ws.send(response_frame(&meta, login_ok_body(), 0, "")).await;
                }
                _ => {
                    // Leave the request hanging, then kick the client.
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    let kick = gate::KickoutNotify {
                        reason: 1,
                        reason_message: "maintenance".to_string(),
                    };
                    let _ = ws
                        .send(notify_frame("gamepb.KickoutNotify", kick.encode_to_vec()))
                        .await;
                }
            }
        }
    })
    .await;

    let (net, logger) = connect(addr, fast_timing()).await;
    let (_, mut logs) = logger.subscribe();
    net.login().await.expect("login");

    let err = net
        .send_request("X.Y", "Hang", vec![0x02])
        .await
        .expect_err("in-flight call must fail on kickout");
    assert!(
        matches!(err, RpcError::Closed),
        "expected connection-closed, got {err}"
    );
    assert_eq!(net.disconnect_reason(), DisconnectReason::Kickout);
    assert_eq!(net.pending_count(), 0);
    assert!(net.is_closed());

    // The kick reason was logged from the push.
    let mut saw_kick_log = false;
    while let Ok(entry) = logs.try_recv() {
        if entry.tag == "推送" && entry.message.contains("maintenance") {
            saw_kick_log = true;
        }
    }
    assert!(saw_kick_log);
}

#[tokio::test]
async fn supervisor_does_not_reconnect_after_kickout() {
    let (addr, conns) = serve(|mut ws, _| async move {
        while let Some((meta, _)) = read_request(&mut ws).await {
            match meta.method_name.as_str() {
                "Login" => {
                    let _ = ws.send(response_frame(&meta, login_ok_body(), 0, "")).await;
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    let kick = gate::KickoutNotify {
                        reason: 1,
                        reason_message: "dup login".to_string(),
                    };
                    let _ = ws
                        .send(notify_frame("gamepb.KickoutNotify", kick.encode_to_vec()))
                        .await;
                }
                _ => {
                    let _ = ws.send(response_frame(&meta, Vec::new(), 0, "")).await;
                }
            }
        }
    })
    .await;

    let inst = test_instance(addr, fast_timing());
    inst.start().await.expect("initial start");

    // Give the watchdog time to observe the kickout, then well past any
    // backoff window to prove it gave up.
    tokio::time::sleep(Duration::from_millis(400)).await;

    let status = inst.status();
    assert!(!status.running);
    assert!(
        status.error.contains("kickout"),
        "error was {:?}",
        status.error
    );
    assert_eq!(conns.load(Ordering::SeqCst), 1, "no reconnect allowed");
}

#[tokio::test]
async fn heartbeat_three_strikes_tear_down_the_session() {
    let (addr, _) = serve(|mut ws, _| async move {
        while let Some((meta, _)) = read_request(&mut ws).await {
            if meta.method_name == "Login" {
                let _ = ws.send(response_frame(&meta, login_ok_body(), 0, "")).await;
            }
            // Heartbeats go unanswered.
        }
    })
    .await;

    let mut timing = fast_timing();
    timing.heartbeat_period = Duration::from_millis(50);
    let (net, logger) = connect(addr, timing).await;
    let (_, mut logs) = logger.subscribe();
    net.login().await.expect("login");
    net.start_heartbeat();

    tokio::time::timeout(Duration::from_secs(2), net.done())
        .await
        .expect("session must close after three strikes");
    assert_eq!(net.disconnect_reason(), DisconnectReason::HeartbeatTimeout);
    assert_eq!(net.pending_count(), 0);

    let mut failure_warns = 0;
    while let Ok(entry) = logs.try_recv() {
        if entry.tag == "心跳" && entry.level == LogLevel::Warn && entry.message.starts_with("失败")
        {
            failure_warns += 1;
        }
    }
    assert_eq!(failure_warns, 3);
}

#[tokio::test]
async fn two_heartbeat_failures_do_not_kill_the_session() {
    let (addr, _) = serve(|mut ws, _| async move {
        let mut heartbeats = 0;
        while let Some((meta, _)) = read_request(&mut ws).await {
            match meta.method_name.as_str() {
                "Login" => {
                    let _ = ws.send(response_frame(&meta, login_ok_body(), 0, "")).await;
                }
                "Heartbeat" => {
                    heartbeats += 1;
                    if heartbeats > 2 {
                        let body = user::HeartbeatReply {
                            server_time: chrono::Utc::now().timestamp_millis() + 5_000,
                        }
                        .encode_to_vec();
                        let _ = ws.send(response_frame(&meta, body, 0, "")).await;
                    }
                }
                _ => {}
            }
        }
    })
    .await;

    let mut timing = fast_timing();
    timing.heartbeat_period = Duration::from_millis(50);
    let (net, _) = connect(addr, timing).await;
    net.login().await.expect("login");
    net.start_heartbeat();

    // Two failures, then a success resets the strike counter. The session
    // must survive and pick up the server clock offset.
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert!(!net.is_closed());
    assert_eq!(net.disconnect_reason(), DisconnectReason::Unknown);
    let delta = net.server_time_delta_ms();
    assert!(
        (2_000..=8_000).contains(&delta),
        "server time delta not synced: {delta}"
    );
}

#[tokio::test]
async fn supervisor_reconnects_after_heartbeat_timeout() {
    let (addr, conns) = serve(|mut ws, _| async move {
        while let Some((meta, _)) = read_request(&mut ws).await {
            match meta.method_name.as_str() {
                "Login" => {
                    let _ = ws.send(response_frame(&meta, login_ok_body(), 0, "")).await;
                }
                "Heartbeat" => {} // never answered: every session dies
                _ => {
                    let _ = ws.send(response_frame(&meta, Vec::new(), 0, "")).await;
                }
            }
        }
    })
    .await;

    let mut timing = fast_timing();
    timing.heartbeat_period = Duration::from_millis(50);
    let inst = test_instance(addr, timing);
    inst.start().await.expect("initial start");

    // First session dies of heartbeat timeout (retryable), the watchdog
    // must come back for more.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if conns.load(Ordering::SeqCst) >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(
        conns.load(Ordering::SeqCst) >= 2,
        "watchdog never reconnected"
    );
    inst.stop().await;
}

#[tokio::test]
async fn login_timeout_strikes_out_the_watchdog() {
    let (addr, conns) = serve(|mut ws, ordinal| async move {
        if ordinal == 1 {
            // First session: log in fine, then drop the link to trigger a
            // retryable disconnect.
            while let Some((meta, _)) = read_request(&mut ws).await {
                if meta.method_name == "Login" {
                    let _ = ws.send(response_frame(&meta, login_ok_body(), 0, "")).await;
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    return; // socket drops
                }
            }
        } else {
            // Reconnect attempts: hold the socket open, never answer.
            while read_request(&mut ws).await.is_some() {}
        }
    })
    .await;

    let inst = test_instance(addr, fast_timing());
    inst.start().await.expect("initial start");

    // 3 login timeouts at ~300 ms each plus doubling backoffs.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(8);
    loop {
        let status = inst.status();
        if status.error.contains("登录超时达上限") {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "watchdog never surrendered; error={:?}",
            status.error
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    // 1 good session + exactly 3 login attempts, then no further dials.
    let attempts = conns.load(Ordering::SeqCst);
    assert_eq!(attempts, 4, "expected 1 session + 3 login attempts");
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(conns.load(Ordering::SeqCst), attempts, "gave up means gave up");
    assert!(!inst.status().running);
}

#[tokio::test]
async fn notifies_update_user_state_until_convergence() {
    let (addr, _) = serve(|mut ws, _| async move {
        while let Some((meta, _)) = read_request(&mut ws).await {
            if meta.method_name == "Login" {
                let _ = ws.send(response_frame(&meta, login_ok_body(), 0, "")).await;
                // Let the login call settle before racing state updates in.
                tokio::time::sleep(Duration::from_millis(100)).await;

                let basic = user::BasicNotify {
                    basic: Some(user::UserBasic {
                        gid: 0,
                        name: String::new(),
                        level: 11,
                        exp: 0,
                        gold: 6000,
                    }),
                };
                let _ = ws
                    .send(notify_frame("gamepb.BasicNotify", basic.encode_to_vec()))
                    .await;

                let items = item::ItemNotify {
                    items: vec![
                        item::ItemChange {
                            item: Some(item::Item {
                                id: 1101,
                                count: 777,
                                uid: 0,
                            }),
                        },
                        item::ItemChange {
                            item: Some(item::Item {
                                id: 1001,
                                count: 6500,
                                uid: 0,
                            }),
                        },
                    ],
                };
                let _ = ws
                    .send(notify_frame("gamepb.ItemNotify", items.encode_to_vec()))
                    .await;
            }
        }
    })
    .await;

    let (net, _) = connect(addr, fast_timing()).await;
    net.login().await.expect("login");

    // Notifies race the login reply; the state is eventually consistent.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let snap = net.user().snapshot();
        if snap.level == 11 && snap.exp == 777 && snap.gold == 6500 {
            // Untouched fields keep their login values.
            assert_eq!(snap.gid, TEST_GID);
            assert_eq!(snap.name, "测试号");
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "state never converged: {snap:?}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn unknown_notify_reaches_the_hook() {
    let (addr, _) = serve(|mut ws, _| async move {
        let _ = ws
            .send(notify_frame("gamepb.WeatherNotify", vec![0x0A, 0x00]))
            .await;
        while read_request(&mut ws).await.is_some() {}
    })
    .await;

    let seen: Arc<std::sync::Mutex<Vec<String>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    let logger = Logger::new(1, None);
    let _net = Net::connect(
        &format!("ws://{addr}/prod/ws"),
        "wx",
        "1.0.0",
        "testcode",
        logger,
        fast_timing(),
        Some(Box::new(move |msg_type, _body| {
            sink.lock().unwrap().push(msg_type.to_string());
        })),
    )
    .await
    .expect("connect");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if seen.lock().unwrap().iter().any(|t| t == "gamepb.WeatherNotify") {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "hook never fired");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
