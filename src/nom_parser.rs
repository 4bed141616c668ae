use nom::IResult;

type Buf = [u8];

pub(crate) mod master {
    use super::*;
    use crate::command::TERMINATOR;
    use nom::character::complete::char;
    use nom::combinator::all_consuming;
    use nom::multi::count;
    use nom::number::complete::be_u32;
    use nom::sequence::terminated;

    fn word(buf: &Buf) -> IResult<&Buf, u32> {
        be_u32(buf)
    }

    fn tag_byte(buf: &Buf) -> IResult<&Buf, char> {
        char(TERMINATOR as char)(buf)
    }

    /// Parse a numeric reply: exactly `words` big-endian words and the terminator.
    /// Returns None if the reply has any other shape.
    pub(crate) fn parse_words(buf: &Buf, words: usize) -> Option<Vec<u32>> {
        let parsed: IResult<&Buf, Vec<u32>> =
            all_consuming(terminated(count(word, words), tag_byte))(buf);
        parsed.ok().map(|(_rest, codes)| codes)
    }

}

pub(crate) mod node {
    use super::*;
    use crate::command::*;
    use crate::types::MAX_CHANNELS;
    use nom::branch::alt;
    use nom::bytes::streaming::{tag, take_till};
    use nom::combinator::{map, value, verify};
    use nom::multi::count;
    use nom::number::streaming::{be_u32, be_u8};
    use nom::sequence::{pair, preceded, terminated, tuple};

    #[derive(PartialEq, Debug, Clone)]
    pub(crate) enum CommandToken {
        SetOutput(u8, u32),
        ReadOutput(u8),
        SetSync(Vec<u32>),
        SetClear(u8, u32),
        Clear(u8),
        ReadClear(u8),
        Initialize(u8, u8),
        Reset(u8),
        Echo,
        Invalid,
        NeedData,
    }

    /// Parse one command frame from the start of `buf`.
    /// Returns the number of bytes consumed, zero when more data is needed.
    pub(crate) fn parse_command(buf: &Buf) -> (usize, CommandToken) {
        match alt((command, skip_invalid))(buf) {
            Ok((remaining, token)) => (buf.len() - remaining.len(), token),
            Err(_) => (0, CommandToken::NeedData),
        }
    }

    fn command(buf: &Buf) -> IResult<&Buf, CommandToken> {
        use CommandToken::*;
        alt((
            map(addressed_word(SET, OUTPUT), |(a, code)| SetOutput(a, code)),
            map(addressed(READ, OUTPUT), ReadOutput),
            set_sync,
            map(addressed_word(SET, SETCLR), |(a, code)| SetClear(a, code)),
            map(addressed_byte(SET, CLEAR), |(a, _)| Clear(a)),
            map(addressed(READ, SETCLR), ReadClear),
            map(addressed_byte(SET, INIT), |(a, mode)| Initialize(a, mode)),
            map(addressed_byte(SET, RESET), |(a, _)| Reset(a)),
            value(Echo, echo),
        ))(buf)
    }

    /// Drop everything up to and including the next terminator.
    fn skip_invalid(buf: &Buf) -> IResult<&Buf, CommandToken> {
        let (buf, _) = terminated(take_till(|c: u8| c == TERMINATOR), byte(TERMINATOR))(buf)?;
        Ok((buf, CommandToken::Invalid))
    }

    fn set_sync(buf: &Buf) -> IResult<&Buf, CommandToken> {
        let (buf, channels) = preceded(
            pair(byte(SET), byte(SYNC)),
            verify(octet, |n: &u8| (1..=MAX_CHANNELS).contains(&(*n as usize))),
        )(buf)?;
        let (buf, codes) = count(word, channels as usize)(buf)?;
        Ok((buf, CommandToken::SetSync(codes)))
    }

    fn echo(buf: &Buf) -> IResult<&Buf, &Buf> {
        preceded(byte(ECHO), tag(&ECHO_PAYLOAD[..]))(buf)
    }

    /// `<primary> <secondary> <address> \n`
    fn addressed<'a>(
        primary: u8,
        secondary: u8,
    ) -> impl FnMut(&'a Buf) -> IResult<&'a Buf, u8> {
        preceded(
            pair(byte(primary), byte(secondary)),
            terminated(octet, byte(TERMINATOR)),
        )
    }

    /// `<primary> <secondary> <address> <byte> \n`
    fn addressed_byte<'a>(
        primary: u8,
        secondary: u8,
    ) -> impl FnMut(&'a Buf) -> IResult<&'a Buf, (u8, u8)> {
        preceded(
            pair(byte(primary), byte(secondary)),
            terminated(pair(octet, octet), byte(TERMINATOR)),
        )
    }

    /// `<primary> <secondary> <address> <u32 code> \n`
    fn addressed_word<'a>(
        primary: u8,
        secondary: u8,
    ) -> impl FnMut(&'a Buf) -> IResult<&'a Buf, (u8, u32)> {
        preceded(
            pair(byte(primary), byte(secondary)),
            terminated(tuple((octet, word)), byte(TERMINATOR)),
        )
    }

    fn octet(buf: &Buf) -> IResult<&Buf, u8> {
        be_u8(buf)
    }

    fn word(buf: &Buf) -> IResult<&Buf, u32> {
        be_u32(buf)
    }

    fn byte<'a>(b: u8) -> impl Fn(&'a Buf) -> IResult<&'a Buf, char> {
        nom::character::streaming::char(b as char)
    }

}
