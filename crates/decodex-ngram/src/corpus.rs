//! Training text for the bigram model

use crate::error::{NgramError, Result};
use std::path::Path;
use tracing::info;

/// Built-in corpus used when no corpus file is configured
pub const DEFAULT_CORPUS: &str = "\
Once upon a time there was a small village at the edge of a deep forest.
The people of the village were farmers, and every morning they walked to the fields.
In the forest there lived an old fox who knew every path between the trees.
The fox was clever, and the villagers said that he could talk to the wind.
One day a young girl followed the fox into the forest to find a lost lamb.
She walked for hours, and the trees grew taller and the light grew dim.
At last she found the lamb sleeping beside a river under an old stone bridge.
The fox sat on the bridge and watched her with bright yellow eyes.
\"Why are you here?\" asked the fox. \"I came for the lamb,\" said the girl.
The fox showed her the way home, and the girl thanked him with bread and honey.
From that day the village and the fox were friends, and nobody was lost again.
Language models predict the next word from the words that came before it.
A greedy decoder always picks the most likely next word.
Beam search keeps several candidate sentences and chooses the best one at the end.
Sampling draws the next word at random, so every run can tell a different story.
A high temperature makes the story surprising, and a low temperature makes it safe.
The weather was cold in winter, and the river froze from one bank to the other.
In spring the snow melted, the fields turned green, and the birds came back to the forest.
The farmers planted wheat and corn, and the children played near the old stone bridge.
Every evening the families sat together, ate their bread, and told stories about the fox.
";

/// Read a corpus from a UTF-8 text file
pub fn load_corpus(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path).map_err(|source| NgramError::CorpusRead {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = text.len(), "Loaded corpus");
    Ok(text)
}

/// Non-empty lines of a corpus; each one is a training document
pub fn documents(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}
