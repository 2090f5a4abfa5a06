// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

pub const SYSTEM_PROMPT: &str = "You're a meme expert. You're very smart and see meanings between the lines. \
You know all famous persons and all characters from every show, movie and game. \
Use correct meme names (like Pepe, Wojak, etc.) and media references. \
Reply with one JSON object only, without code fences or extra prose.";

const SCHEMA: &str = r#"{"references": "Famous persons or characters from movies, shows, cartoons or games featured in the meme. Omit if there are none", "template": "Established meme character or template (such as 'trollface', 'wojak', 'Pepe the Frog', 'Loss'). Omit if there is none", "caption": "Captions in their original language. Omit if there are none", "description": "Describe the meme with its captions (if any) in mind", "meaning": "Explain what this meme means, using what you determined earlier", "tags": ["Up to 10 short lower case keywords for searching, each one to three words"]}"#;

/// Instruction for a meme made of one file.
pub fn single() -> String {
    format!(
        "This image is a meme. Analyze it and return JSON of the following structure: {}",
        SCHEMA
    )
}

/// Instruction for an album, where `count` images are sent in album order.
pub fn album(count: usize) -> String {
    format!(
        "These {} images are one meme, in reading order. Analyze them together and return \
        one JSON object of the following structure: {}",
        count, SCHEMA
    )
}
