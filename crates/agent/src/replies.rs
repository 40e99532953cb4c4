//! What the bot says back.

use trufa_core::phrase::PhraseEntry;

pub const LEARNED: &str = "Aprendido!";
pub const ALREADY_KNOWN: &str = "Ya conozco esa frase en toda su exactitud, cacho monger!";
pub const TRIGGER_TOO_SHORT: &str = "Esa frase es muy corta, gilipollas.";
pub const EMPTY_RESPONSE: &str = "Por lo menos ten la decencia de especificar una respuesta, no?";
pub const LEARN_FAILED: &str = "No he podido aprender eso...";

pub const PHRASE_REMOVED: &str = "Frase eliminada!";
pub const PHRASE_NOT_FOUND: &str =
    "A ver, o la frase no existe o me ha explotado el cerebro, una de dos...";
pub const FORGET_FAILED: &str = "No he podido olvidar eso...";
pub const STALE_SELECTION: &str =
    "Esa lista ya no vale, alguien ha tocado las frases. Pidemelo otra vez.";

pub const PRIVATE_ONLY: &str = "Eso me lo dices por privado, que aqui nos conocemos todos.";
pub const GROUP_ONLY: &str = "Eso solo tiene gracia en un grupo, alma de cantaro.";

pub const UNMUTED: &str = "Ya estoy aqui otra vez!";
pub const ALREADY_SPEAKING: &str = "Pero si ya estoy hablando...";

pub const GAME_START: &str = "Quereis empezar una partida? Eso merece un buen patataspam!";

pub fn muted_for(minutes: i64) -> String {
    format!("Vale, me callo durante {minutes} minutos.")
}

/// The multi-candidate forget prompt. The first line carries the trigger in
/// double quotes; button presses recover it from there.
pub fn disambiguation_prompt(trigger: &str, candidates: &[PhraseEntry]) -> String {
    let mut text = format!("Conozco varias respuestas para \"{trigger}\", cual olvido?");
    for (i, entry) in candidates.iter().enumerate() {
        text.push_str(&format!("\n{}. {}", i + 1, entry.response));
    }
    text
}
