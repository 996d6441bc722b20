use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::Duration;

use anyhow::Context as _;
use chrono::Utc;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use prost::Message as _;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use farmproto::gate;
use farmproto::plant;
use farmproto::user;

use crate::logger::Logger;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;

// The gateway rejects unknown user agents.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 MicroMessenger/7.0.20.1781(0x6700143B) NetType/WIFI MiniProgramEnv/Windows WindowsWechat/WMPF WindowsWechat(0x63090a13)";
const ORIGIN: &str = "https://gate-obt.nqf.qq.com";

/// Consecutive heartbeat failures before the session is torn down.
pub const MAX_HEARTBEAT_FAILURES: u32 = 3;

// Item ids the server uses as virtual counters in ItemNotify pushes.
// Opaque server conventions: both ids in each set alias the same counter.
const EXP_COUNTER_IDS: [i64; 2] = [2, 1101];
const GOLD_COUNTER_IDS: [i64; 2] = [1, 1001];

/// Every protocol timeout and period in one place. `Default` is the
/// production tuning; tests shrink these to drive failure paths quickly.
#[derive(Debug, Clone)]
pub struct NetTiming {
    pub handshake_timeout: Duration,
    pub write_timeout: Duration,
    /// Max silence on the socket before the read loop gives up. Every
    /// inbound frame, pong included, resets it.
    pub read_timeout: Duration,
    pub ping_period: Duration,
    pub request_timeout: Duration,
    pub login_timeout: Duration,
    pub heartbeat_period: Duration,
    /// Age of the last heartbeat success that triggers the degraded-link
    /// diagnostic.
    pub heartbeat_stale_after: Duration,
    pub reconnect_backoff_init: Duration,
    pub reconnect_backoff_max: Duration,
}

impl Default for NetTiming {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            ping_period: Duration::from_secs(25),
            request_timeout: Duration::from_secs(10),
            login_timeout: Duration::from_secs(30),
            heartbeat_period: Duration::from_secs(25),
            heartbeat_stale_after: Duration::from_secs(60),
            reconnect_backoff_init: Duration::from_secs(2),
            reconnect_backoff_max: Duration::from_secs(60),
        }
    }
}

/// Why a session ended. Written at most once per session (first writer
/// wins); the watchdog reads it exactly once to pick a retry strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Unknown,
    PingFailed,
    ReadError,
    Kickout,
    HeartbeatTimeout,
    LoginFailed,
    LoginTimeout,
    Closed,
}

impl DisconnectReason {
    /// Whether the watchdog should attempt reconnection.
    pub fn retryable(self) -> bool {
        match self {
            // The server kicked us; retrying is futile.
            DisconnectReason::Kickout => false,
            // Intentional stop.
            DisconnectReason::Closed => false,
            _ => true,
        }
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DisconnectReason::Unknown => "unknown",
            DisconnectReason::PingFailed => "ping_failed",
            DisconnectReason::ReadError => "read_error",
            DisconnectReason::Kickout => "kickout",
            DisconnectReason::HeartbeatTimeout => "heartbeat_timeout",
            DisconnectReason::LoginFailed => "login_failed",
            DisconnectReason::LoginTimeout => "login_timeout",
            DisconnectReason::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Connection lifecycle. `Dialing` only exists inside [`Net::connect`];
/// once the value is observable the session is logging in or further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Dialing = 0,
    LoggingIn = 1,
    Active = 2,
    Closed = 3,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Dialing,
            1 => SessionState::LoggingIn,
            2 => SessionState::Active,
            _ => SessionState::Closed,
        }
    }
}

/// Business error carried in a response envelope (`error_code != 0`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub service: String,
    pub method: String,
    pub code: i64,
    pub message: String,
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} error {}: {}",
            self.service, self.method, self.code, self.message
        )
    }
}

impl std::error::Error for ServerError {}

/// Outcome classes for one RPC. Exactly one of these (or a success body)
/// reaches the caller, never more than one.
#[derive(Debug, Clone)]
pub enum RpcError {
    Timeout {
        service: String,
        method: String,
        after: Duration,
    },
    Server(ServerError),
    /// The session was torn down while the call was in flight.
    Closed,
    /// Dropped proactively after consecutive heartbeat failures.
    Degraded,
    Write(String),
    Decode(prost::DecodeError),
    Protocol(&'static str),
}

impl RpcError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::Timeout { .. })
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcError::Timeout {
                service,
                method,
                after,
            } => write!(f, "timeout: {service}.{method} (after {after:?})"),
            RpcError::Server(e) => e.fmt(f),
            RpcError::Closed => f.write_str("connection closed"),
            RpcError::Degraded => f.write_str("heartbeat degraded, pending call dropped"),
            RpcError::Write(e) => write!(f, "write: {e}"),
            RpcError::Decode(e) => write!(f, "decode reply: {e}"),
            RpcError::Protocol(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for RpcError {}

/// Mutable snapshot of the account as last reported by the server.
#[derive(Debug, Clone, Default)]
pub struct UserSnapshot {
    pub gid: i64,
    pub name: String,
    pub level: i64,
    pub exp: i64,
    pub gold: i64,
}

#[derive(Debug, Default)]
pub struct UserState {
    inner: RwLock<UserSnapshot>,
}

impl UserState {
    pub fn snapshot(&self) -> UserSnapshot {
        self.inner.read().unwrap().clone()
    }

    fn set_from_login(&self, basic: &user::UserBasic) {
        let mut st = self.inner.write().unwrap();
        st.gid = basic.gid;
        st.name = basic.name.clone();
        st.level = basic.level;
        st.exp = basic.exp;
        st.gold = basic.gold;
    }
}

/// Hook for notify types the engine has no built-in handler for.
pub type NotifyHook = Box<dyn Fn(&str, &[u8]) + Send + Sync>;

type CallResult = Result<(Vec<u8>, gate::Meta), RpcError>;

/// One WebSocket session to the game gateway: framed envelope I/O, the
/// request/response multiplexer, notify dispatch, keepalive and heartbeat.
///
/// All writes are linearized through one async mutex; the read loop is the
/// only reader. Dropping the session means cancelling [`Net::done`]: every
/// task observes the token and every pending call resolves with an error.
pub struct Net {
    sink: tokio::sync::Mutex<WsSink>,
    client_seq: AtomicI64,
    server_seq: AtomicI64,
    pending: Mutex<HashMap<i64, oneshot::Sender<CallResult>>>,

    user: UserState,
    logger: Arc<Logger>,
    on_notify: Option<NotifyHook>,
    client_version: String,

    reason: OnceLock<DisconnectReason>,
    session: AtomicU8,

    last_heartbeat_ok_ms: AtomicI64,
    server_time_delta_ms: AtomicI64,

    cancel: CancellationToken,
    timing: NetTiming,
}

impl Net {
    /// Dial the gateway and start the read and ping loops.
    ///
    /// The URL grows the query string the gateway authenticates on; the
    /// fixed browser-like headers are mandatory.
    pub async fn connect(
        server_url: &str,
        platform: &str,
        client_version: &str,
        code: &str,
        logger: Arc<Logger>,
        timing: NetTiming,
        on_notify: Option<NotifyHook>,
    ) -> anyhow::Result<Arc<Net>> {
        let url = format!(
            "{server_url}?platform={platform}&os=iOS&ver={client_version}&code={code}&openID="
        );
        let mut request = url.into_client_request().context("build ws request")?;
        let headers = request.headers_mut();
        headers.insert("User-Agent", HeaderValue::from_static(USER_AGENT));
        headers.insert("Origin", HeaderValue::from_static(ORIGIN));

        let (ws, _) = tokio::time::timeout(timing.handshake_timeout, connect_async(request))
            .await
            .context("ws handshake timed out")?
            .context("ws dial")?;
        let (sink, stream) = ws.split();

        let net = Arc::new(Net {
            sink: tokio::sync::Mutex::new(sink),
            client_seq: AtomicI64::new(0),
            server_seq: AtomicI64::new(0),
            pending: Mutex::new(HashMap::new()),
            user: UserState::default(),
            logger,
            on_notify,
            client_version: client_version.to_string(),
            reason: OnceLock::new(),
            session: AtomicU8::new(SessionState::Dialing as u8),
            last_heartbeat_ok_ms: AtomicI64::new(Utc::now().timestamp_millis()),
            server_time_delta_ms: AtomicI64::new(0),
            cancel: CancellationToken::new(),
            timing,
        });
        net.session
            .store(SessionState::LoggingIn as u8, Ordering::Release);

        tokio::spawn(net.clone().read_loop(stream));
        tokio::spawn(net.clone().ping_loop());

        Ok(net)
    }

    pub fn user(&self) -> &UserState {
        &self.user
    }

    pub fn session_state(&self) -> SessionState {
        SessionState::from_u8(self.session.load(Ordering::Acquire))
    }

    /// The recorded disconnect reason; `Unknown` while the session lives.
    pub fn disconnect_reason(&self) -> DisconnectReason {
        self.reason
            .get()
            .copied()
            .unwrap_or(DisconnectReason::Unknown)
    }

    /// Milliseconds to add to local time to approximate server time.
    /// Not monotonic; resynced on every heartbeat.
    pub fn server_time_delta_ms(&self) -> i64 {
        self.server_time_delta_ms.load(Ordering::Relaxed)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the session has been torn down, whatever the cause.
    pub async fn done(&self) {
        self.cancel.cancelled().await
    }

    /// Record the disconnect reason (first writer wins), cancel every task
    /// and fail every in-flight call.
    pub fn disconnect_with_reason(&self, reason: DisconnectReason) {
        let _ = self.reason.set(reason);
        self.session
            .store(SessionState::Closed as u8, Ordering::Release);
        self.cancel.cancel();
        self.drain_pending(RpcError::Closed);
    }

    /// Orderly shutdown: best-effort close frame, then teardown.
    pub async fn close(&self) {
        self.disconnect_with_reason(DisconnectReason::Closed);
        let frame = WsMessage::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        }));
        let _ = self.write_frame(frame).await;
    }

    fn drain_pending(&self, err: RpcError) -> usize {
        let waiters: Vec<_> = {
            let mut pending = self.pending.lock().unwrap();
            pending.drain().collect()
        };
        let count = waiters.len();
        for (_, tx) in waiters {
            let _ = tx.send(Err(err.clone()));
        }
        count
    }

    async fn write_frame(&self, msg: WsMessage) -> Result<(), String> {
        let mut sink = self.sink.lock().await;
        match tokio::time::timeout(self.timing.write_timeout, sink.send(msg)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("write timed out".to_string()),
        }
    }

    /// Issue one RPC and wait for its reply with the default timeout.
    pub async fn send_request(
        &self,
        service: &str,
        method: &str,
        body: Vec<u8>,
    ) -> Result<Vec<u8>, RpcError> {
        self.send_request_with_timeout(service, method, body, self.timing.request_timeout)
            .await
    }

    /// Issue one RPC: allocate a client sequence, register the waiter,
    /// write the envelope, block for the reply. Exactly one of reply body,
    /// timeout, server error or connection-closed comes back.
    pub async fn send_request_with_timeout(
        &self,
        service: &str,
        method: &str,
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, RpcError> {
        let seq = self.client_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let envelope = gate::Message {
            meta: Some(gate::Meta {
                service_name: service.to_string(),
                method_name: method.to_string(),
                message_type: gate::MESSAGE_TYPE_REQUEST,
                client_seq: seq,
                server_seq: self.server_seq.load(Ordering::Acquire),
                error_code: 0,
                error_message: String::new(),
            }),
            body,
        };
        let data = envelope.encode_to_vec();

        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(seq, tx);

        if let Err(e) = self.write_frame(WsMessage::Binary(data)).await {
            self.pending.lock().unwrap().remove(&seq);
            return Err(RpcError::Write(e));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok((reply, meta)))) => {
                if meta.error_code != 0 {
                    return Err(RpcError::Server(ServerError {
                        service: service.to_string(),
                        method: method.to_string(),
                        code: meta.error_code,
                        message: meta.error_message,
                    }));
                }
                Ok(reply)
            }
            Ok(Ok(Err(e))) => Err(e),
            // Waiter dropped without a result: the pending table was torn down.
            Ok(Err(_)) => Err(RpcError::Closed),
            Err(_) => {
                self.pending.lock().unwrap().remove(&seq);
                Err(RpcError::Timeout {
                    service: service.to_string(),
                    method: method.to_string(),
                    after: timeout,
                })
            }
        }
    }

    /// Typed request/reply wrapper over [`Net::send_request`].
    pub async fn call<Req, Reply>(
        &self,
        service: &str,
        method: &str,
        req: &Req,
    ) -> Result<Reply, RpcError>
    where
        Req: prost::Message,
        Reply: prost::Message + Default,
    {
        let reply = self.send_request(service, method, req.encode_to_vec()).await?;
        Reply::decode(reply.as_slice()).map_err(RpcError::Decode)
    }

    pub async fn all_lands(&self) -> Result<plant::AllLandsReply, RpcError> {
        self.call(plant::SERVICE, "AllLands", &plant::AllLandsRequest {})
            .await
    }

    pub async fn unlock_land(&self, land_id: i64) -> Result<plant::UnlockLandReply, RpcError> {
        self.call(plant::SERVICE, "UnlockLand", &plant::UnlockLandRequest { land_id })
            .await
    }

    pub async fn upgrade_land(&self, land_id: i64) -> Result<plant::UpgradeLandReply, RpcError> {
        self.call(plant::SERVICE, "UpgradeLand", &plant::UpgradeLandRequest { land_id })
            .await
    }

    /// Authenticate the session. Uses the extended login timeout and tags
    /// the disconnect reason so the watchdog can strike-count timeouts.
    pub async fn login(&self) -> Result<(), RpcError> {
        let req = user::LoginRequest {
            sharer_id: 0,
            sharer_open_id: String::new(),
            device_info: Some(user::DeviceInfo {
                client_version: self.client_version.clone(),
                sys_software: "iOS 26.2.1".to_string(),
                network: "wifi".to_string(),
                memory: 7672,
                device_id: "iPhone X<iPhone18,3>".to_string(),
            }),
            share_cfg_id: 0,
            scene_id: "1256".to_string(),
            report_data: Some(user::ReportData {
                minigame_channel: "other".to_string(),
                minigame_platid: 2,
            }),
        };
        let reply_body = match self
            .send_request_with_timeout(
                user::SERVICE,
                "Login",
                req.encode_to_vec(),
                self.timing.login_timeout,
            )
            .await
        {
            Ok(body) => body,
            Err(e) => {
                let reason = if e.is_timeout() {
                    DisconnectReason::LoginTimeout
                } else {
                    DisconnectReason::LoginFailed
                };
                self.disconnect_with_reason(reason);
                return Err(e);
            }
        };

        let reply = match user::LoginReply::decode(reply_body.as_slice()) {
            Ok(r) => r,
            Err(e) => {
                self.disconnect_with_reason(DisconnectReason::LoginFailed);
                return Err(RpcError::Decode(e));
            }
        };
        let Some(basic) = reply.basic else {
            self.disconnect_with_reason(DisconnectReason::LoginFailed);
            return Err(RpcError::Protocol("login reply missing basic info"));
        };
        self.user.set_from_login(&basic);
        self.session
            .store(SessionState::Active as u8, Ordering::Release);
        self.logger.info(
            "登录",
            format!(
                "成功 GID={} 昵称={} Lv{} 金币={}",
                basic.gid, basic.name, basic.level, basic.gold
            ),
        );
        Ok(())
    }

    /// Launch the heartbeat task. Skips ticks until login has populated the
    /// GID; three consecutive failures kill the session, two already drain
    /// every pending call so stuck waiters don't pile up.
    pub fn start_heartbeat(self: &Arc<Self>) {
        let net = self.clone();
        tokio::spawn(async move {
            let mut consecutive_failures = 0u32;
            loop {
                tokio::select! {
                    _ = net.cancel.cancelled() => return,
                    _ = tokio::time::sleep(net.timing.heartbeat_period) => {}
                }

                let snap = net.user.snapshot();
                if snap.gid == 0 {
                    continue;
                }

                let last_ms = net.last_heartbeat_ok_ms.load(Ordering::Relaxed);
                let silent_ms = Utc::now().timestamp_millis() - last_ms;
                if silent_ms > net.timing.heartbeat_stale_after.as_millis() as i64 {
                    net.logger.warn(
                        "心跳",
                        format!(
                            "连接可能已断开 ({}s 无响应, pending={})",
                            silent_ms / 1000,
                            net.pending_count()
                        ),
                    );
                }

                let req = user::HeartbeatRequest {
                    gid: snap.gid,
                    client_version: net.client_version.clone(),
                };
                match net
                    .send_request(user::SERVICE, "Heartbeat", req.encode_to_vec())
                    .await
                {
                    Err(e) => {
                        consecutive_failures += 1;
                        net.logger.warn(
                            "心跳",
                            format!(
                                "失败 ({}/{}): {}",
                                consecutive_failures, MAX_HEARTBEAT_FAILURES, e
                            ),
                        );
                        if consecutive_failures >= 2 {
                            let dropped = net.drain_pending(RpcError::Degraded);
                            if dropped > 0 {
                                net.logger
                                    .warn("心跳", format!("已清理 {dropped} 个残留请求"));
                            }
                        }
                        if consecutive_failures >= MAX_HEARTBEAT_FAILURES {
                            net.logger.warn(
                                "心跳",
                                format!("连续失败 {MAX_HEARTBEAT_FAILURES} 次，断开连接"),
                            );
                            net.disconnect_with_reason(DisconnectReason::HeartbeatTimeout);
                            return;
                        }
                    }
                    Ok(reply_body) => {
                        consecutive_failures = 0;
                        net.last_heartbeat_ok_ms
                            .fetch_max(Utc::now().timestamp_millis(), Ordering::Relaxed);
                        net.sync_server_time(&reply_body);
                    }
                }
            }
        });
    }

    fn sync_server_time(&self, reply_body: &[u8]) {
        if reply_body.is_empty() {
            return;
        }
        let Ok(reply) = user::HeartbeatReply::decode(reply_body) else {
            return;
        };
        if reply.server_time > 0 {
            let local_now = Utc::now().timestamp_millis();
            self.server_time_delta_ms
                .store(reply.server_time - local_now, Ordering::Relaxed);
        }
    }

    async fn ping_loop(self: Arc<Self>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(self.timing.ping_period) => {}
            }
            if let Err(e) = self.write_frame(WsMessage::Ping(Vec::new())).await {
                if !self.cancel.is_cancelled() {
                    self.logger.warn("WS", format!("Ping 失败: {e}"));
                }
                self.disconnect_with_reason(DisconnectReason::PingFailed);
                return;
            }
        }
    }

    async fn read_loop(self: Arc<Self>, mut stream: SplitStream<WsStream>) {
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => break,
                r = tokio::time::timeout(self.timing.read_timeout, stream.next()) => r,
            };
            let msg = match next {
                Err(_) => {
                    if !self.cancel.is_cancelled() {
                        self.logger.warn(
                            "WS",
                            format!("读取超时 ({}s 无数据)", self.timing.read_timeout.as_secs()),
                        );
                    }
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    if !self.cancel.is_cancelled() {
                        self.logger.warn("WS", format!("读取失败: {e}"));
                    }
                    break;
                }
                Ok(Some(Ok(m))) => m,
            };
            match msg {
                WsMessage::Binary(data) => self.handle_frame(&data),
                WsMessage::Close(_) => break,
                // Pings, pongs and stray text frames refresh the read
                // deadline simply by arriving.
                _ => {}
            }
        }
        // No-op when Kickout, ping failure or an explicit close already
        // recorded a more specific reason.
        self.disconnect_with_reason(DisconnectReason::ReadError);
    }

    fn handle_frame(&self, data: &[u8]) {
        let Ok(msg) = gate::Message::decode(data) else {
            return;
        };
        let Some(meta) = msg.meta else {
            return;
        };

        if meta.server_seq > 0 {
            advance_server_seq(&self.server_seq, meta.server_seq);
        }

        match meta.message_type {
            gate::MESSAGE_TYPE_RESPONSE => {
                let waiter = self.pending.lock().unwrap().remove(&meta.client_seq);
                // Unknown sequences (late replies after a timeout) drop here.
                if let Some(tx) = waiter {
                    let _ = tx.send(Ok((msg.body, meta)));
                }
            }
            gate::MESSAGE_TYPE_NOTIFY => self.handle_notify(&msg.body),
            _ => {}
        }
    }

    fn handle_notify(&self, body: &[u8]) {
        if body.is_empty() {
            return;
        }
        let Ok(event) = gate::EventMessage::decode(body) else {
            return;
        };
        let msg_type = event.message_type.as_str();

        if msg_type.contains("Kickout") {
            if let Ok(kick) = gate::KickoutNotify::decode(event.body.as_slice()) {
                self.logger
                    .warn("推送", format!("被踢下线: {}", kick.reason_message));
            }
            self.disconnect_with_reason(DisconnectReason::Kickout);
            return;
        }

        if msg_type.contains("BasicNotify") {
            if let Ok(notify) = user::BasicNotify::decode(event.body.as_slice()) {
                if let Some(basic) = notify.basic {
                    let (old_level, new_level) = {
                        let mut st = self.user.inner.write().unwrap();
                        let old = st.level;
                        if basic.level > 0 {
                            st.level = basic.level;
                        }
                        if basic.gold > 0 {
                            st.gold = basic.gold;
                        }
                        if basic.exp > 0 {
                            st.exp = basic.exp;
                        }
                        (old, st.level)
                    };
                    if new_level != old_level {
                        self.logger
                            .info("系统", format!("升级! Lv{old_level} → Lv{new_level}"));
                    }
                }
            }
            return;
        }

        if msg_type.contains("ItemNotify") {
            if let Ok(notify) = farmproto::item::ItemNotify::decode(event.body.as_slice()) {
                for chg in notify.items {
                    let Some(item) = chg.item else {
                        continue;
                    };
                    if EXP_COUNTER_IDS.contains(&item.id) {
                        self.user.inner.write().unwrap().exp = item.count;
                    } else if GOLD_COUNTER_IDS.contains(&item.id) {
                        self.user.inner.write().unwrap().gold = item.count;
                    }
                }
            }
            return;
        }

        if let Some(hook) = &self.on_notify {
            hook(msg_type, &event.body);
        }
    }
}

/// Raise the stored server sequence to `observed` unless a higher value is
/// already there. Out-of-order frames must never regress it.
fn advance_server_seq(stored: &AtomicI64, observed: i64) {
    let mut current = stored.load(Ordering::Acquire);
    while observed > current {
        match stored.compare_exchange_weak(current, observed, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => break,
            Err(now) => current = now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_matrix() {
        assert!(!DisconnectReason::Kickout.retryable());
        assert!(!DisconnectReason::Closed.retryable());
        assert!(DisconnectReason::Unknown.retryable());
        assert!(DisconnectReason::PingFailed.retryable());
        assert!(DisconnectReason::ReadError.retryable());
        assert!(DisconnectReason::HeartbeatTimeout.retryable());
        assert!(DisconnectReason::LoginFailed.retryable());
        assert!(DisconnectReason::LoginTimeout.retryable());
    }

    #[test]
    fn reason_display_is_snake_case() {
        assert_eq!(DisconnectReason::HeartbeatTimeout.to_string(), "heartbeat_timeout");
        assert_eq!(DisconnectReason::Kickout.to_string(), "kickout");
    }

    #[test]
    fn server_seq_never_regresses() {
        let seq = AtomicI64::new(0);
        advance_server_seq(&seq, 5);
        assert_eq!(seq.load(Ordering::Acquire), 5);
        advance_server_seq(&seq, 3);
        assert_eq!(seq.load(Ordering::Acquire), 5);
        advance_server_seq(&seq, 9);
        assert_eq!(seq.load(Ordering::Acquire), 9);
    }

    #[test]
    fn rpc_error_formats() {
        let err = RpcError::Timeout {
            service: "X.Y".to_string(),
            method: "M".to_string(),
            after: Duration::from_millis(100),
        };
        assert!(err.to_string().contains("X.Y.M"));
        assert!(err.is_timeout());
        assert_eq!(RpcError::Closed.to_string(), "connection closed");
        assert!(!RpcError::Closed.is_timeout());
    }
}
