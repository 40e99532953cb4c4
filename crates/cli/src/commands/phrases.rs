//! `trufa phrases`: phrase administration outside of a chat.

use trufa_agent::{LearnOutcome, PhraseStore};
use trufa_core::phrase::{PhraseEntry, PhraseFilter};

use super::{load_config, open_collection};

pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let store = PhraseStore::with_random_picker(open_collection(&config.storage).await?);

    let mut entries = store.list().await?;
    if entries.is_empty() {
        println!("No phrases learned yet.");
        return Ok(());
    }
    entries.sort_by(|a, b| a.trigger.cmp(&b.trigger));

    println!("{} phrases ({})", entries.len(), store.backend());
    println!();
    for entry in &entries {
        println!("  \"{}\" -> \"{}\"", entry.trigger, entry.response);
    }
    Ok(())
}

pub async fn add(trigger: &str, response: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let store = PhraseStore::with_random_picker(open_collection(&config.storage).await?);

    match store.learn(trigger, response).await? {
        LearnOutcome::Learned => println!("Learned \"{}\" -> \"{response}\"", trigger.to_lowercase()),
        LearnOutcome::AlreadyExists => println!("Already known, nothing to do."),
        LearnOutcome::TriggerTooShort => {
            return Err("Trigger must be at least 3 characters long".into());
        }
        LearnOutcome::EmptyResponse => return Err("Response must not be empty".into()),
    }
    Ok(())
}

pub async fn remove(
    trigger: &str,
    response: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let collection = open_collection(&config.storage).await?;

    let trigger = trigger.to_lowercase();
    let filter = match response {
        Some(response) => PhraseFilter::exact(&PhraseEntry::new(trigger.as_str(), response)),
        None => PhraseFilter::trigger(trigger.as_str()),
    };

    let removed = collection.delete_where(&filter).await?;
    if removed == 0 {
        println!("No phrase matched \"{trigger}\".");
    } else {
        println!("Removed {removed} phrase(s) for \"{trigger}\".");
    }
    Ok(())
}
