/// WebSocket transport for live grid viewports
///
/// One actor per connection. Requests are handled against the shared
/// `ServiceContext` as they arrive; replies wait in the connection's
/// `MessageQueue` and are written on two timers, a fast one for responses to
/// direct requests and a slower one that also collects table deltas.
use actix::prelude::*;
use actix_web_actors::ws;
use log::{debug, error, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::config::ServerConfig;
use crate::messages::ServerMessage;
use crate::queue::{MessageQueue, PRIORITY_HIGH};
use crate::service::ServiceContext;

/// Shared state for all WebSocket connections
pub struct AppState {
    pub context: Arc<Mutex<ServiceContext>>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(context: ServiceContext, config: ServerConfig) -> Self {
        Self {
            context: Arc::new(Mutex::new(context)),
            config,
        }
    }

    /// A panic while holding the lock leaves the registry usable; every
    /// mutation it makes is applied or rejected as a whole.
    pub fn lock(&self) -> MutexGuard<'_, ServiceContext> {
        self.context.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// WebSocket connection actor
pub struct GridWebSocket {
    hb: Instant,
    client_id: u64,
    queue: MessageQueue,
    state: actix_web::web::Data<AppState>,
}

impl GridWebSocket {
    pub fn new(state: actix_web::web::Data<AppState>) -> Self {
        Self {
            hb: Instant::now(),
            client_id: 0,
            queue: MessageQueue::new(),
            state,
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let timeout = self.state.config.client_timeout;
        ctx.run_interval(self.state.config.heartbeat_interval, move |act, ctx| {
            if Instant::now().duration_since(act.hb) > timeout {
                warn!("client {} heartbeat failed, disconnecting", act.client_id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn send(ctx: &mut ws::WebsocketContext<Self>, messages: Vec<ServerMessage>) {
        for message in messages {
            match serde_json::to_string(&message) {
                Ok(text) => ctx.text(text),
                Err(e) => error!("failed to encode {:?}: {}", message.viewport(), e),
            }
        }
    }

    fn flush_priority(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let messages = self.queue.extract(PRIORITY_HIGH);
        Self::send(ctx, messages);
    }

    fn flush_all(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        self.state.lock().collect_updates(self.client_id, &mut self.queue);
        let messages = self.queue.drain();
        if !messages.is_empty() {
            debug!("client {}: flushing {} messages", self.client_id, messages.len());
        }
        Self::send(ctx, messages);
    }
}

impl Actor for GridWebSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.client_id = self.state.lock().register_client(&mut self.queue);
        self.hb(ctx);
        ctx.run_interval(self.state.config.priority_interval, |act, ctx| act.flush_priority(ctx));
        ctx.run_interval(self.state.config.update_interval, |act, ctx| act.flush_all(ctx));
        self.flush_priority(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.state.lock().unsubscribe_all(self.client_id, &mut self.queue);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for GridWebSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                self.state.lock().handle_text(self.client_id, &text, &mut self.queue);
            }
            Ok(ws::Message::Binary(_)) => {
                warn!("client {}: unexpected binary message", self.client_id);
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            _ => ctx.stop(),
        }
    }
}
