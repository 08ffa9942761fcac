use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use console::style;
use futures::StreamExt;

use slo_agent::agent::{Agent, AgentEvent};
use slo_agent::models::message::Message;
use slo_agent::models::role::Role;

use super::message_serialize::deserialize_messages;
use super::session_file::{persist_messages, readable_session_file};

pub struct Session {
    agent: Agent,
    session_file: PathBuf,
    messages: Vec<Message>,
}

impl Session {
    /// Open a session, resuming any messages already recorded in its file.
    pub fn new(agent: Agent, session_file: PathBuf) -> Result<Self> {
        let messages = if session_file.exists() {
            deserialize_messages(readable_session_file(&session_file)?)?
        } else {
            Vec::new()
        };

        Ok(Session {
            agent,
            session_file,
            messages,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        println!(
            "Starting session. Recording to {}",
            self.session_file.display()
        );
        println!("{}", style("Type \"exit\" to end the session.").dim());

        loop {
            let input: String = cliclack::input("Message:")
                .placeholder("")
                .multiline()
                .interact()?;
            if input.trim().eq_ignore_ascii_case("exit") {
                break;
            }

            if let Err(e) = self.process_turn(&input).await {
                eprintln!("Error: {}", e);
            }
        }

        println!(
            "Closing session. Recorded to {}",
            self.session_file.display()
        );
        Ok(())
    }

    pub async fn headless(&mut self, input: &str) -> Result<()> {
        self.process_turn(input).await
    }

    /// Drive one streamed turn: print assistant text as it arrives, note
    /// tool activity, and persist the conversation after every appended
    /// message.
    async fn process_turn(&mut self, input: &str) -> Result<()> {
        let mut printed = false;
        {
            let mut stream = self.agent.stream(input, Some(self.messages.clone()));
            let mut turn_messages: Vec<Message> = Vec::new();

            let spin = cliclack::spinner();
            spin.start("awaiting reply");
            let mut waiting = true;

            while let Some(event) = stream.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        if waiting {
                            spin.stop("");
                        }
                        return Err(e);
                    }
                };
                if waiting {
                    spin.stop("");
                    waiting = false;
                }
                match event {
                    AgentEvent::Chunk(piece) => {
                        print!("{}", piece);
                        std::io::stdout().flush()?;
                        printed = true;
                    }
                    AgentEvent::Message(message) => {
                        render_activity(&message);
                        turn_messages.push(message);
                    }
                }
            }
            if waiting {
                spin.stop("");
            }

            self.messages.push(Message::user().with_text(input));
            self.messages.extend(turn_messages);
        }

        if printed {
            println!();
        }
        persist_messages(&self.session_file, &self.messages)?;
        Ok(())
    }
}

/// One dim status line per tool interaction; assistant text itself is
/// already on screen from the chunk stream.
fn render_activity(message: &Message) {
    match message.role {
        Role::Assistant => {
            for request in message.tool_requests() {
                match &request.tool_call {
                    Ok(call) => println!("{}", style(format!("→ calling {}", call.name)).dim()),
                    Err(e) => println!("{}", style(format!("→ bad tool request: {}", e)).dim()),
                }
            }
        }
        Role::Tool => {
            println!("{}", style("← tool result received").dim());
        }
        Role::User => {}
    }
}
