/// Command keywords a client may send.
///
/// Keywords are matched case-insensitively; anything else maps to
/// [`Keyword::Unknown`] so the dispatcher can answer `500 unknown command`
/// without disturbing session state.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Keyword {
    /// `USER <name>`
    User,
    /// `PASS <hex>`
    Pass,
    /// `PUT <urlencoded-filename>`
    Put,
    /// `GET` (download is not implemented)
    Get,
    /// `DATA <size> <hash|-> <client_salt> <signature>`
    Data,
    /// `CONFIRM <hash> <signature>`
    Confirm,
    /// `QUIT`
    Quit,
    /// Any other keyword, including an empty line.
    Unknown,
}

impl Keyword {
    /// Classifies a keyword token.
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        const KEYWORDS: [(&str, Keyword); 7] = [
            ("user", Keyword::User),
            ("pass", Keyword::Pass),
            ("put", Keyword::Put),
            ("get", Keyword::Get),
            ("data", Keyword::Data),
            ("confirm", Keyword::Confirm),
            ("quit", Keyword::Quit),
        ];

        KEYWORDS
            .iter()
            .find(|(name, _)| token.eq_ignore_ascii_case(name))
            .map_or(Self::Unknown, |&(_, keyword)| keyword)
    }

    /// Lowercase wire spelling used by the client.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Pass => "pass",
            Self::Put => "put",
            Self::Get => "get",
            Self::Data => "data",
            Self::Confirm => "confirm",
            Self::Quit => "quit",
            Self::Unknown => "",
        }
    }
}

/// Splits a command line into its keyword and the trimmed argument text.
///
/// The argument text is `None` when nothing but whitespace follows the
/// keyword.
#[must_use]
pub fn split_command(line: &str) -> (Keyword, Option<&str>) {
    let line = line.trim_start();
    let (token, rest) = match line.find(|c: char| c.is_ascii_whitespace()) {
        Some(index) => line.split_at(index),
        None => (line, ""),
    };
    let rest = rest.trim();
    let args = (!rest.is_empty()).then_some(rest);
    (Keyword::from_token(token), args)
}
