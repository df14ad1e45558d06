use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{debug, info, warn};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::models::PlayerEvent;
use crate::services::player_events::PlayerEvents;

/// How often heartbeat pings are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// How long before lack of client response causes a timeout
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Message)]
#[rtype(result = "()")]
struct ForwardEvent(PlayerEvent);

/// WebSocket actor forwarding player lifecycle events to one dashboard
/// subscriber. Each connection holds its own broadcast receiver; closing the
/// socket is the cancellation path, which ends the pump task because the
/// actor's address goes away.
pub struct PlayerEventsWs {
    connection_id: Uuid,
    events: PlayerEvents,
    last_heartbeat: Instant,
    pump_stop: Option<oneshot::Sender<()>>,
}

impl PlayerEventsWs {
    pub fn new(events: PlayerEvents) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            events,
            last_heartbeat: Instant::now(),
            pump_stop: None,
        }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                warn!(
                    "Player events subscriber {} heartbeat failed, disconnecting",
                    act.connection_id
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"heartbeat");
        });
    }

    fn start_event_pump(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let (stop_tx, stop_rx) = oneshot::channel();
        self.pump_stop = Some(stop_tx);
        spawn_event_pump(
            ctx.address().recipient(),
            self.events.subscribe(),
            stop_rx,
            self.connection_id,
        );
    }
}

/// Pump broadcast events into the actor mailbox until the connection goes
/// away, signalled either through the stop channel or a dead mailbox.
fn spawn_event_pump(
    subscriber: Recipient<ForwardEvent>,
    mut rx: broadcast::Receiver<PlayerEvent>,
    mut stop: oneshot::Receiver<()>,
    connection_id: Uuid,
) {
    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                _ = &mut stop => break,
                received = rx.recv() => received,
            };
            match received {
                Ok(event) => match subscriber.try_send(ForwardEvent(event)) {
                    Ok(()) => {}
                    // A burst of property changes can outpace the mailbox;
                    // queue past capacity instead of ending the subscription.
                    Err(SendError::Full(event)) => subscriber.do_send(event),
                    Err(SendError::Closed(_)) => break,
                },
                Err(RecvError::Lagged(missed)) => {
                    debug!(
                        "Player events subscriber {} lagged, dropped {} events",
                        connection_id, missed
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

impl Actor for PlayerEventsWs {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("Player events subscriber {} connected", self.connection_id);
        self.start_heartbeat(ctx);
        self.start_event_pump(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        // End the pump with the connection instead of leaving it parked on
        // the broadcast receiver until the next published event.
        if let Some(stop) = self.pump_stop.take() {
            let _ = stop.send(());
        }
        info!("Player events subscriber {} disconnected", self.connection_id);
    }
}

impl Handler<ForwardEvent> for PlayerEventsWs {
    type Result = ();

    fn handle(&mut self, msg: ForwardEvent, ctx: &mut Self::Context) {
        match serde_json::to_string(&msg.0) {
            Ok(frame) => ctx.text(frame),
            Err(e) => warn!("Failed to serialize player event: {}", e),
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for PlayerEventsWs {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            // The subscription is one-way; inbound frames are ignored
            Ok(_) => {}
            Err(e) => {
                warn!(
                    "Player events subscriber {} protocol error: {}",
                    self.connection_id, e
                );
                ctx.stop();
            }
        }
    }
}

pub async fn player_events_ws(
    req: HttpRequest,
    stream: web::Payload,
    events: web::Data<PlayerEvents>,
) -> Result<HttpResponse, actix_web::Error> {
    ws::start(PlayerEventsWs::new(events.get_ref().clone()), &req, stream)
}
