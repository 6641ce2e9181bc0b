//! Encodage des lignes pour `COPY ... FROM STDIN WITH (FORMAT csv)`
//!
//! `NULL ''` : un champ vide non quoté est NULL, un texte vide est `""`.

use std::fmt::Display;

use bytes::BytesMut;

/// Écriture d'une ligne CSV champ par champ
pub(crate) struct CsvRow<'a> {
    buf: &'a mut BytesMut,
    first: bool,
}

impl<'a> CsvRow<'a> {
    pub fn new(buf: &'a mut BytesMut) -> Self {
        Self { buf, first: true }
    }

    fn separator(&mut self) {
        if !self.first {
            self.buf.extend_from_slice(b",");
        }
        self.first = false;
    }

    /// Texte toujours quoté ; les sauts de ligne restent dans le champ
    pub fn text(&mut self, value: &str) -> &mut Self {
        self.separator();
        self.buf.extend_from_slice(b"\"");
        for chunk in value.split_inclusive('"') {
            self.buf.extend_from_slice(chunk.as_bytes());
            if chunk.ends_with('"') {
                self.buf.extend_from_slice(b"\"");
            }
        }
        self.buf.extend_from_slice(b"\"");
        self
    }

    /// Valeur non quotée (nombres, dates)
    pub fn plain(&mut self, value: impl Display) -> &mut Self {
        self.separator();
        self.buf.extend_from_slice(value.to_string().as_bytes());
        self
    }

    pub fn null(&mut self) -> &mut Self {
        self.separator();
        self
    }

    pub fn end(&mut self) {
        self.buf.extend_from_slice(b"\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_encoding() {
        let mut buf = BytesMut::new();
        CsvRow::new(&mut buf)
            .plain(7)
            .text("Usina \"Boa\"\nVista")
            .null()
            .text("")
            .plain(1.5)
            .end();
        assert_eq!(&buf[..], b"7,\"Usina \"\"Boa\"\"\nVista\",,\"\",1.5\n");
    }

    #[test]
    fn test_text_keeps_line_breaks() {
        let mut buf = BytesMut::new();
        CsvRow::new(&mut buf).text("FAZ\r\nSANTA \"RITA\"\n").plain(2).end();
        assert_eq!(&buf[..], b"\"FAZ\r\nSANTA \"\"RITA\"\"\n\",2\n");
    }
}
