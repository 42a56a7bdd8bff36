//! Minimal request-target URI.
//!
//! Only what request-line handling needs: scheme/host/port/path/query
//! split, host rewriting, and display. Percent-encoding canonicalization
//! is deliberately not performed; targets round-trip as given.

use std::fmt;

use crate::error::{Error, StartLine};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    scheme: String,
    host: Option<String>,
    port: Option<u16>,
    path: String,
    query: Option<String>,
}

impl Uri {
    /// Parses a request target. Schemeless targets get `http` as their
    /// scheme, since request-line targets are commonly origin-form.
    ///
    /// Accepted shapes: absolute (`http://host:port/path?q`), origin-form
    /// (`/path?q`), asterisk-form (`*`), and authority-form
    /// (`host:port`, as used by `CONNECT`).
    pub fn parse(target: &str) -> crate::Result<Self> {
        if target.is_empty() {
            return Err(Error::new_start_line(StartLine::Uri));
        }
        if let Some(scheme_end) = target.find("://") {
            let scheme = target[..scheme_end].to_owned();
            if scheme.is_empty() {
                return Err(Error::new_start_line(StartLine::Uri));
            }
            let rest = &target[scheme_end + 3..];
            let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
            let (host, port) = parse_authority(&rest[..authority_end])?;
            let (path, query) = split_path_query(&rest[authority_end..]);
            Ok(Self {
                scheme,
                host,
                port,
                path,
                query,
            })
        } else if target.starts_with('/') || target == "*" {
            let (path, query) = split_path_query(target);
            Ok(Self {
                scheme: "http".to_owned(),
                host: None,
                port: None,
                path,
                query,
            })
        } else {
            // authority-form, or an absolute target missing its scheme
            let authority_end = target.find(['/', '?']).unwrap_or(target.len());
            let (host, port) = parse_authority(&target[..authority_end])?;
            if host.is_none() {
                return Err(Error::new_start_line(StartLine::Uri));
            }
            let (path, query) = split_path_query(&target[authority_end..]);
            Ok(Self {
                scheme: "http".to_owned(),
                host,
                port,
                path,
                query,
            })
        }
    }

    /// A new URI with the host (and optional `:port`) replaced, keeping
    /// scheme, path and query.
    pub fn with_host(&self, host: &str) -> crate::Result<Self> {
        let (host, port) = parse_authority(host.trim())?;
        if host.is_none() {
            return Err(Error::new_start_line(StartLine::Uri));
        }
        Ok(Self {
            scheme: self.scheme.clone(),
            host,
            port,
            path: self.path.clone(),
            query: self.query.clone(),
        })
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// The host with its port, as it would appear in a `Host` header.
    #[must_use]
    pub fn host_header_value(&self) -> Option<String> {
        self.host.as_ref().map(|host| match self.port {
            Some(port) => format!("{host}:{port}"),
            None => host.clone(),
        })
    }

    /// The origin-form target written on a request-line: path plus query,
    /// `/` when the path is empty.
    #[must_use]
    pub fn request_target(&self) -> String {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        match &self.query {
            Some(query) => format!("{path}?{query}"),
            None => path.to_owned(),
        }
    }
}

fn parse_authority(authority: &str) -> crate::Result<(Option<String>, Option<u16>)> {
    if authority.is_empty() {
        return Ok((None, None));
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port: u16 = port
                .parse()
                .map_err(|_| Error::new_start_line(StartLine::Uri))?;
            Ok((Some(host.to_owned()), Some(port)))
        }
        Some(_) => Err(Error::new_start_line(StartLine::Uri)),
        None => Ok((Some(authority.to_owned()), None)),
    }
}

fn split_path_query(rest: &str) -> (String, Option<String>) {
    match rest.split_once('?') {
        Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
        None => (rest.to_owned(), None),
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Some(host) => {
                write!(f, "{}://{host}", self.scheme)?;
                if let Some(port) = self.port {
                    write!(f, ":{port}")?;
                }
                f.write_str(&self.path)?;
            }
            None => f.write_str(&self.path)?,
        }
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}
