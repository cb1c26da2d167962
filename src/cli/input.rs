// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Input parsing for the chat prompt
//!
//! Pure classification of a line typed at the prompt, kept free of I/O so it
//! can be tested directly.

use std::path::PathBuf;

/// What a line typed at the prompt asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    /// A question for the assistant
    Message(String),
    Upload(Vec<PathBuf>),
    Delete(String),
    Files,
    Cancel,
    Reset,
    Usage,
    Help,
    Quit,
    Empty,
    /// A slash command that is unknown or missing its argument
    Invalid(String),
}

/// Classify one input line
pub fn parse_input(line: &str) -> ReplInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ReplInput::Empty;
    }
    if !trimmed.starts_with('/') {
        if matches!(trimmed.to_lowercase().as_str(), "exit" | "quit" | "salir") {
            return ReplInput::Quit;
        }
        return ReplInput::Message(trimmed.to_string());
    }

    let (command, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (trimmed, ""),
    };

    match command.to_lowercase().as_str() {
        "/upload" | "/subir" => {
            if rest.is_empty() {
                ReplInput::Invalid("Uso: /upload <ruta> [<ruta>...]".to_string())
            } else {
                ReplInput::Upload(rest.split_whitespace().map(PathBuf::from).collect())
            }
        }
        "/delete" | "/borrar" => {
            if rest.is_empty() {
                ReplInput::Invalid("Uso: /delete <id>".to_string())
            } else {
                ReplInput::Delete(rest.to_string())
            }
        }
        "/files" | "/archivos" => ReplInput::Files,
        "/cancel" | "/cancelar" => ReplInput::Cancel,
        "/reset" | "/limpiar" => ReplInput::Reset,
        "/usage" | "/uso" => ReplInput::Usage,
        "/help" | "/ayuda" => ReplInput::Help,
        "/quit" | "/exit" | "/salir" => ReplInput::Quit,
        other => ReplInput::Invalid(format!("Comando desconocido: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_message() {
        assert_eq!(
            parse_input("  ¿Qué dice el artículo 1?  "),
            ReplInput::Message("¿Qué dice el artículo 1?".to_string())
        );
        assert_eq!(parse_input("   "), ReplInput::Empty);
    }

    #[test]
    fn test_exit_words() {
        assert_eq!(parse_input("exit"), ReplInput::Quit);
        assert_eq!(parse_input("/QUIT"), ReplInput::Quit);
        assert_eq!(parse_input("salir"), ReplInput::Quit);
    }

    #[test]
    fn test_upload_paths() {
        assert_eq!(
            parse_input("/upload ley.pdf fallo.docx"),
            ReplInput::Upload(vec![PathBuf::from("ley.pdf"), PathBuf::from("fallo.docx")])
        );
        assert!(matches!(parse_input("/upload"), ReplInput::Invalid(_)));
    }

    #[test]
    fn test_delete_requires_id() {
        assert_eq!(
            parse_input("/delete file_abc"),
            ReplInput::Delete("file_abc".to_string())
        );
        assert!(matches!(parse_input("/delete   "), ReplInput::Invalid(_)));
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse_input("/files"), ReplInput::Files);
        assert_eq!(parse_input("/cancel"), ReplInput::Cancel);
        assert_eq!(parse_input("/reset"), ReplInput::Reset);
        assert_eq!(parse_input("/usage"), ReplInput::Usage);
        assert_eq!(parse_input("/ayuda"), ReplInput::Help);
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse_input("/model gpt-4o"),
            ReplInput::Invalid("Comando desconocido: /model".to_string())
        );
    }
}
