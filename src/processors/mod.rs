//! Default line processors.
//!
//! One module per protocol concern; [`register_defaults`] wires them all
//! into a [`Registry`]. Applications can override any command by
//! registering their own processor afterwards.

use std::sync::Arc;

use crate::dispatch::Registry;

mod away;
mod cap;
mod join;
mod kick;
mod listmodes;
mod message;
mod misc;
mod mode;
mod names;
mod nick;
mod part;
mod quit;
mod topic;
mod welcome;

/// Register the default processor for every supported command and
/// numeric.
pub fn register_defaults(registry: &mut Registry) {
    registry.register("001", Arc::new(welcome::Welcome));
    registry.register("CAP", Arc::new(cap::Cap));

    registry.register("JOIN", Arc::new(join::Join));
    registry.register_many(
        &["403", "405", "471", "473", "474", "475"],
        Arc::new(join::JoinFailed),
    );
    registry.register("PART", Arc::new(part::Part));
    registry.register("KICK", Arc::new(kick::Kick));
    registry.register("QUIT", Arc::new(quit::Quit));
    registry.register("NICK", Arc::new(nick::Nick));

    registry.register_many(&["MODE", "324", "221"], Arc::new(mode::Mode));
    registry.register_many(
        &[
            "344", "345", "346", "347", "348", "349", "367", "368", "386", "387", "388", "389",
        ],
        Arc::new(listmodes::ListModes),
    );

    registry.register_many(&["353", "366"], Arc::new(names::Names));
    registry.register_many(&["TOPIC", "332", "333", "329"], Arc::new(topic::Topic));
    registry.register_many(
        &["301", "305", "306", "AWAY", "352"],
        Arc::new(away::Away),
    );

    registry.register_many(&["PRIVMSG", "NOTICE"], Arc::new(message::Message));
    registry.register("NOTICE AUTH", Arc::new(message::NoticeAuth));

    registry.register("PING", Arc::new(misc::Ping));
    registry.register("004", Arc::new(misc::MyInfo));
    registry.register("005", Arc::new(misc::IsupportTokens));
    registry.register("ACCOUNT", Arc::new(misc::Account));
    registry.register("CHGHOST", Arc::new(misc::ChgHost));
}
