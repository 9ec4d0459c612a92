use std::fmt;
use std::str::FromStr;

/// Keys forwarded through tmux's named-key path rather than as literal text.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SpecialKey {
    Enter,
    Escape,
    Tab,
    BackTab,
    Backspace,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    F(u8),
}

impl SpecialKey {
    pub fn tmux_name(self) -> String {
        match self {
            Self::Enter => "Enter".to_string(),
            Self::Escape => "Escape".to_string(),
            Self::Tab => "Tab".to_string(),
            Self::BackTab => "BTab".to_string(),
            Self::Backspace => "BSpace".to_string(),
            Self::Up => "Up".to_string(),
            Self::Down => "Down".to_string(),
            Self::Left => "Left".to_string(),
            Self::Right => "Right".to_string(),
            Self::Home => "Home".to_string(),
            Self::End => "End".to_string(),
            Self::PageUp => "PPage".to_string(),
            Self::PageDown => "NPage".to_string(),
            Self::Insert => "IC".to_string(),
            Self::Delete => "DC".to_string(),
            Self::F(n) => format!("F{n}"),
        }
    }
}

impl fmt::Display for SpecialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tmux_name())
    }
}

impl FromStr for SpecialKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let key = match normalized.as_str() {
            "enter" | "return" => Self::Enter,
            "escape" | "esc" => Self::Escape,
            "tab" => Self::Tab,
            "backtab" | "btab" => Self::BackTab,
            "backspace" | "bspace" => Self::Backspace,
            "up" => Self::Up,
            "down" => Self::Down,
            "left" => Self::Left,
            "right" => Self::Right,
            "home" => Self::Home,
            "end" => Self::End,
            "pageup" | "ppage" => Self::PageUp,
            "pagedown" | "npage" => Self::PageDown,
            "insert" | "ic" => Self::Insert,
            "delete" | "dc" => Self::Delete,
            other => {
                let function = other
                    .strip_prefix('f')
                    .and_then(|n| n.parse::<u8>().ok())
                    .filter(|n| (1..=12).contains(n));
                match function {
                    Some(n) => Self::F(n),
                    None => return Err(format!("unknown special key '{value}'")),
                }
            }
        };
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::SpecialKey;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Enter".parse::<SpecialKey>(), Ok(SpecialKey::Enter));
        assert_eq!("ESC".parse::<SpecialKey>(), Ok(SpecialKey::Escape));
        assert_eq!("f5".parse::<SpecialKey>(), Ok(SpecialKey::F(5)));
    }

    #[test]
    fn maps_to_tmux_key_names() {
        assert_eq!(SpecialKey::PageUp.tmux_name(), "PPage");
        assert_eq!(SpecialKey::Delete.tmux_name(), "DC");
        assert_eq!(SpecialKey::Backspace.tmux_name(), "BSpace");
        assert_eq!(SpecialKey::F(12).tmux_name(), "F12");
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!("hyper".parse::<SpecialKey>().is_err());
        assert!("f13".parse::<SpecialKey>().is_err());
        assert!("f0".parse::<SpecialKey>().is_err());
    }
}
