use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::{Arc, Mutex};

use reactor::{Dispatcher, EventHandler, Handle, Payload, StaleEventPolicy};
use tracing::{debug, info, warn};

use crate::{Acceptor, Connection, ERR_POISONED_LOCK, Error, Game, Input, Outcome, Phase, Result};

/// A guessing game server: accepts players over TCP and runs one game for all of them.
///
/// Every player connection and the listening socket are sources of one [`Dispatcher`], so all
/// game logic runs on the thread that calls [`run()`][Self::run], one input at a time.
///
/// The game ends when a player completes the word or the players run out of misses. At that
/// point every connection is closed and `run()` returns.
#[derive(Debug)]
pub struct Server {
    dispatcher: Dispatcher<Input>,
    table: Arc<Mutex<Table>>,
    local_addr: SocketAddr,
}

/// State shared by every handler. Only ever locked on the dispatch thread.
#[derive(Debug)]
struct Table {
    game: Game,
    seats: Vec<Seat>,
    players_joined: u32,
}

#[derive(Debug)]
struct Seat {
    name: String,
    connection: Arc<Connection>,
}

impl Table {
    fn broadcast(&self, message: &str) {
        for seat in &self.seats {
            send(&seat.name, &seat.connection, message);
        }
    }

    fn status(&self) -> String {
        format!(
            "word: {}, misses left: {}",
            self.game.masked(),
            self.game.misses_left()
        )
    }
}

fn send(name: &str, connection: &Connection, message: &str) {
    // A failed write means the player is gone; their reader reports that separately.
    if let Err(e) = connection.send(message) {
        debug!(player = %name, error = %e, "send failed");
    }
}

impl Server {
    /// Listens on `addr` for players of `game`, dispatching through a queue of `capacity`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bind`] if the address cannot be listened on and [`Error::Reactor`] if
    /// the dispatcher cannot be created or cannot start reading the listener.
    pub fn bind(addr: impl ToSocketAddrs, game: Game, capacity: usize) -> Result<Self> {
        // Ending the game removes every handler from inside a callback, leaving events of
        // other players in the queue. Those are meaningless once the game is over.
        let dispatcher = Dispatcher::builder()
            .capacity(capacity)
            .stale_event_policy(StaleEventPolicy::Discard)
            .reader_thread_name("guess-reader")
            .build()?;

        let acceptor = Arc::new(Acceptor::bind(addr).map_err(Error::Bind)?);
        let local_addr = acceptor.local_addr();

        let table = Arc::new(Mutex::new(Table {
            game,
            seats: Vec::new(),
            players_joined: 0,
        }));

        dispatcher.add_handler(Arc::new(Lobby {
            acceptor,
            table: Arc::clone(&table),
        }))?;

        Ok(Self {
            dispatcher,
            table,
            local_addr,
        })
    }

    /// The address players connect to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Runs the game to its end, returning how it ended.
    ///
    /// Returns [`Phase::InProgress`] if the server stopped before the game was decided, which
    /// happens if the listening socket fails and every player leaves.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Reactor`] if the dispatch loop fails.
    pub fn run(&self) -> Result<Phase> {
        self.dispatcher.handle_events()?;

        Ok(self
            .table
            .lock()
            .expect(ERR_POISONED_LOCK)
            .game
            .phase()
            .clone())
    }
}

/// Turns new connections into players.
struct Lobby {
    acceptor: Arc<Acceptor>,
    table: Arc<Mutex<Table>>,
}

impl Lobby {
    fn seat(&self, dispatcher: &Dispatcher<Input>, connection: Connection) {
        let connection = Arc::new(connection);
        let mut table = self.table.lock().expect(ERR_POISONED_LOCK);

        table.players_joined = table.players_joined.saturating_add(1);
        let name = format!("player{}", table.players_joined);

        let player = Arc::new(Player {
            name: name.clone(),
            connection: Arc::clone(&connection),
            table: Arc::clone(&self.table),
        });

        if let Err(e) = dispatcher.add_handler(player) {
            warn!(player = %name, error = %e, "cannot start reading from player");
            connection.close();
            return;
        }

        info!(player = %name, peer = %connection.peer(), "player joined");

        table.broadcast(&format!("{name} joined"));
        send(
            &name,
            &connection,
            &format!("welcome, you are {name}. {}", table.status()),
        );

        table.seats.push(Seat { name, connection });
    }
}

impl EventHandler<Input> for Lobby {
    fn handle(&self) -> Arc<dyn Handle<Item = Input>> {
        Arc::clone(&self.acceptor) as Arc<dyn Handle<Item = Input>>
    }

    fn handle_event(&self, dispatcher: &Dispatcher<Input>, payload: Payload<Input>) {
        match payload {
            Payload::Data(Input::Connected(stream)) => match Connection::new(stream) {
                Ok(connection) => self.seat(dispatcher, connection),
                Err(e) => debug!(error = %e, "connection lost before joining"),
            },
            Payload::Data(Input::Line(_)) => {}
            Payload::EndOfStream => {
                // Players already in the game may finish it.
                warn!("no longer accepting players");

                if let Err(e) = dispatcher.remove_handler(self) {
                    warn!(error = %e, "lobby was already removed");
                }
            }
        }
    }
}

/// Applies the guesses of one connected player.
struct Player {
    name: String,
    connection: Arc<Connection>,
    table: Arc<Mutex<Table>>,
}

impl Player {
    fn guess(&self, dispatcher: &Dispatcher<Input>, text: &str) {
        if text.trim().is_empty() {
            return;
        }

        let game_over = {
            let mut table = self.table.lock().expect(ERR_POISONED_LOCK);
            let outcome = table.game.guess(&self.name, text);

            debug!(player = %self.name, ?outcome, "guess");

            match outcome {
                Outcome::Hit {
                    letter,
                    occurrences,
                } => table.broadcast(&format!(
                    "{} found '{letter}' x{occurrences}. {}",
                    self.name,
                    table.status()
                )),
                Outcome::Miss { .. } => table.broadcast(&format!(
                    "{} guessed {:?}, a miss. {}",
                    self.name,
                    text.trim(),
                    table.status()
                )),
                Outcome::AlreadyGuessed { letter } => self.reply(&format!(
                    "'{letter}' was already guessed. {}",
                    table.status()
                )),
                Outcome::Invalid => self.reply("guess a single letter or the whole word"),
                Outcome::Won { word } => {
                    table.broadcast(&format!("{} guessed {word:?} and won", self.name));
                }
                Outcome::Lost { word } => {
                    table.broadcast(&format!("out of misses, the word was {word:?}"));
                }
                Outcome::GameOver => self.reply("the game is over"),
            }

            table.game.is_over()
        };

        if game_over {
            info!(phase = ?self.table.lock().expect(ERR_POISONED_LOCK).game.phase(), "game over");

            let removed = dispatcher.shutdown();
            debug!(removed, "server shut down");
        }
    }

    fn leave(&self, dispatcher: &Dispatcher<Input>) {
        if let Err(e) = dispatcher.remove_handler(self) {
            warn!(player = %self.name, error = %e, "player was already removed");
        }

        self.connection.close();

        let mut table = self.table.lock().expect(ERR_POISONED_LOCK);
        table.seats.retain(|seat| seat.name != self.name);
        table.broadcast(&format!("{} left", self.name));

        info!(player = %self.name, "player left");
    }

    fn reply(&self, message: &str) {
        send(&self.name, &self.connection, message);
    }
}

impl EventHandler<Input> for Player {
    fn handle(&self) -> Arc<dyn Handle<Item = Input>> {
        Arc::clone(&self.connection) as Arc<dyn Handle<Item = Input>>
    }

    fn handle_event(&self, dispatcher: &Dispatcher<Input>, payload: Payload<Input>) {
        match payload {
            Payload::Data(Input::Line(text)) => self.guess(dispatcher, &text),
            Payload::Data(Input::Connected(_)) => {}
            Payload::EndOfStream => self.leave(dispatcher),
        }
    }
}
