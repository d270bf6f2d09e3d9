/// Creates a URL slug from a human readable name: lowercase ASCII letters
/// and digits separated by single dashes. Non-ASCII letters are dropped
/// except for a few common ones that have an obvious ASCII spelling.
pub(crate) fn slugify(name: &str) -> String {
    struct Slug {
        out: String,
        pending_dash: bool,
    }

    impl Slug {
        fn push(&mut self, s: &str) {
            if self.pending_dash && !self.out.is_empty() {
                self.out.push('-');
            }
            self.pending_dash = false;
            self.out.push_str(s);
        }
    }

    let mut slug = Slug { out: String::with_capacity(name.len()), pending_dash: false };
    for c in name.chars().flat_map(char::to_lowercase) {
        let mut buf = [0; 4];
        match c {
            'a'..='z' | '0'..='9' => slug.push(c.encode_utf8(&mut buf)),
            'ä' | 'æ' => slug.push("ae"),
            'ö' | 'ø' | 'œ' => slug.push("oe"),
            'ü' => slug.push("ue"),
            'ß' => slug.push("ss"),
            'à' | 'á' | 'â' | 'ã' | 'å' | 'ą' => slug.push("a"),
            'ç' | 'ć' | 'č' => slug.push("c"),
            'è' | 'é' | 'ê' | 'ë' | 'ę' => slug.push("e"),
            'ì' | 'í' | 'î' | 'ï' => slug.push("i"),
            'ł' => slug.push("l"),
            'ñ' | 'ń' => slug.push("n"),
            'ò' | 'ó' | 'ô' | 'õ' => slug.push("o"),
            'ś' | 'š' => slug.push("s"),
            'ù' | 'ú' | 'û' => slug.push("u"),
            'ź' | 'ż' | 'ž' => slug.push("z"),
            _ => slug.pending_dash = true,
        }
    }

    slug.out
}


#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn simple() {
        assert_eq!(slugify("Blue T-Shirt"), "blue-t-shirt");
        assert_eq!(slugify("  About   us! "), "about-us");
        assert_eq!(slugify("Size 42"), "size-42");
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn transliteration() {
        assert_eq!(slugify("Größe"), "groesse");
        assert_eq!(slugify("Crème Brûlée"), "creme-brulee");
        assert_eq!(slugify("Łódź"), "lodz");
    }
}
