//! Dice, random numbers and canned replies.

use async_trait::async_trait;
use rand::Rng as _;

use super::{CommandError, CommandHandler, Invocation, Reply};

/// `.dice`: roll a six-sided die.
#[derive(Debug, Clone, Copy)]
pub struct Dice;

#[async_trait]
impl CommandHandler for Dice {
    fn name(&self) -> &'static str {
        ".dice"
    }

    fn usage(&self) -> &'static str {
        ".dice: Roll a six sided die"
    }

    async fn handle(&self, _invocation: &Invocation, reply: &Reply) -> Result<(), CommandError> {
        let roll: u8 = rand::thread_rng().gen_range(1..=6);
        reply.send(format!("You rolled a {roll}")).await;
        Ok(())
    }
}

/// `.rng <max>`: number in `0..max`.
#[derive(Debug, Clone, Copy)]
pub struct Rng;

impl Rng {
    fn parse_max(invocation: &Invocation) -> Option<u64> {
        invocation
            .first_arg()
            .and_then(|arg| arg.parse::<u64>().ok())
            .filter(|max| *max > 0)
    }
}

#[async_trait]
impl CommandHandler for Rng {
    fn name(&self) -> &'static str {
        ".rng"
    }

    fn usage(&self) -> &'static str {
        ".rng <max>: Generate a pseudo-random number from 0 to <max>"
    }

    async fn handle(&self, invocation: &Invocation, reply: &Reply) -> Result<(), CommandError> {
        let Some(max) = Self::parse_max(invocation) else {
            reply.send("Usage: .rng <max>").await;
            return Ok(());
        };
        let number = rand::thread_rng().gen_range(0..max);
        reply
            .send(format!("\u{2020}\u{2020}\u{2020}\u{2020}\u{2020}PRAISE RNGESUS\u{2020}\u{2020}\u{2020}\u{2020}\u{2020} {number}"))
            .await;
        Ok(())
    }
}

/// `.yallah`: one of two banners at random.
#[derive(Debug, Clone, Copy)]
pub struct Yallah;

/// Banners `.yallah` picks from.
pub const YALLAH_BANNERS: [&str; 2] = ["YALLAH HABIBI", "░▒▓ YALLAH HABIBI ▓▒░"];

#[async_trait]
impl CommandHandler for Yallah {
    fn name(&self) -> &'static str {
        ".yallah"
    }

    fn usage(&self) -> &'static str {
        ".yallah: YALLAH HABIBI"
    }

    async fn handle(&self, _invocation: &Invocation, reply: &Reply) -> Result<(), CommandError> {
        let fancy = rand::thread_rng().gen_bool(0.5);
        let banner = if fancy {
            YALLAH_BANNERS[1]
        } else {
            YALLAH_BANNERS[0]
        };
        reply.send(banner).await;
        Ok(())
    }
}

/// A command with a fixed reply.
#[derive(Debug, Clone, Copy)]
pub struct Canned {
    name: &'static str,
    usage: &'static str,
    text: &'static str,
}

#[async_trait]
impl CommandHandler for Canned {
    fn name(&self) -> &'static str {
        self.name
    }

    fn usage(&self) -> &'static str {
        self.usage
    }

    async fn handle(&self, _invocation: &Invocation, reply: &Reply) -> Result<(), CommandError> {
        reply.send(self.text).await;
        Ok(())
    }
}

/// `.scrub`, `.dongers`, `.jdongers`.
pub fn canned() -> [Canned; 3] {
    [
        Canned {
            name: ".scrub",
            usage: ".scrub: This is our town",
            text: "(ง ͠° ͟ʖ ͡°)ง This is our town SCRUB (ง ͠° ͟ʖ ͡°)ง (ง •̀_•́)ง Yeah beat it! (ง •̀_•́)ง.",
        },
        Canned {
            name: ".dongers",
            usage: ".dongers: Raise your dongers",
            text: "ヽ༼ຈل͜ຈ༽ﾉ raise your dongers ヽ༼ຈل͜ຈ༽ﾉ",
        },
        Canned {
            name: ".jdongers",
            usage: ".jdongers: Raise your jaedongers",
            text: "ヽ༼ຈل͜ຈ༽ﾉ raise your jaedongers ヽ༼ຈل͜ຈ༽ﾉ",
        },
    ]
}
