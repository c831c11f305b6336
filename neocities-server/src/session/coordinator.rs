use crate::{message::Message, session::session::Session};
use log::{error, info, trace};
use std::time::Duration;
use tokio::{
    sync::mpsc,
    time::{self, Instant, MissedTickBehavior},
};

/// Actor that owns a [`Session`] and applies inbound messages one at a time.
pub struct Coordinator {
    session: Session,
    inbox: mpsc::Receiver<Message>,
    tick_interval: Duration,
}

impl Coordinator {
    pub fn spawn(session: Session, tick_interval: Duration) -> mpsc::Sender<Message> {
        let (tx, inbox) = mpsc::channel(256);
        let coordinator = Coordinator {
            session,
            inbox,
            tick_interval,
        };

        tokio::spawn(coordinator.run());
        tx
    }

    async fn run(mut self) {
        let mut clock = time::interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        clock.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = self.inbox.recv() => {
                    let Some(message) = message else {
                        info!("All connections to the session are gone, stopping coordinator");
                        break;
                    };

                    self.handle_message(message);
                }

                _ = clock.tick() => {
                    let time = self.session.tick();
                    trace!("Session clock at {time}");
                }
            }
        }
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Connect { client_tx, reply } => {
                let client_id = self.session.connect(client_tx);
                if reply.send(client_id.clone()).is_err() {
                    error!("Socket for {client_id} closed before registration finished");
                    let result = self.session.disconnect(&client_id);
                    self.session.settle(&client_id, result);
                }
            }

            Message::Disconnect(client_id) => {
                let result = self.session.disconnect(&client_id);
                self.session.settle(&client_id, result);
            }

            Message::PlayerSelected { client_id, role } => {
                let result = self.session.select_role(&client_id, role);
                self.session.settle(&client_id, result);
            }

            Message::PlayerReady(client_id) => {
                let result = self.session.ready(&client_id);
                self.session.settle(&client_id, result);
            }

            Message::ChatMessage { client_id, message } => {
                let result = self.session.chat(&client_id, message);
                self.session.settle(&client_id, result);
            }

            Message::GetStats(reply) => {
                if reply.send(self.session.stats()).is_err() {
                    error!("Could not send session stats, requester is gone");
                }
            }
        }
    }
}
