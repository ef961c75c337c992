//! Convenience macros that wrap [`logforge`]'s `LoggerProxy` level calls.
//!
//! Each macro takes a logger expression, a message expression, and
//! comma-separated `"key" = value` pairs, expanding at compile time into a
//! single logger call. No level-enabled check happens at expansion time --
//! the runtime performs level gating per sink, so the macro only saves the
//! caller from hand-building the `extra` map.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
  parse::{Parse, ParseStream},
  Expr, LitStr, Result, Token,
};

struct LogInput {
  logger: Expr,
  message: Expr,
  fields: Vec<(LitStr, Expr)>,
}

impl Parse for LogInput {
  fn parse(input: ParseStream) -> Result<Self> {
    let logger: Expr = input.parse()?;
    input.parse::<Token![,]>()?;
    let message: Expr = input.parse()?;

    let mut fields = Vec::new();
    while input.peek(Token![,]) {
      input.parse::<Token![,]>()?;
      if input.is_empty() {
        break;
      }
      let key: LitStr = input.parse()?;
      input.parse::<Token![=]>()?;
      let value: Expr = input.parse()?;
      fields.push((key, value));
    }

    Ok(LogInput {
      logger,
      message,
      fields,
    })
  }
}

fn expand(input: LogInput, method: &str) -> TokenStream2 {
  let logger = &input.logger;
  let message = &input.message;
  let method_ident = syn::Ident::new(method, proc_macro2::Span::call_site());

  if input.fields.is_empty() {
    quote! {
      #logger.#method_ident(#message, ::std::option::Option::None)
    }
  } else {
    let keys: Vec<_> = input.fields.iter().map(|(k, _)| k).collect();
    let values: Vec<_> = input.fields.iter().map(|(_, v)| v).collect();
    quote! {
      #logger.#method_ident(
        #message,
        ::std::option::Option::Some(::logforge::serde_json::json!({ #(#keys: #values),* })),
      )
    }
  }
}

macro_rules! define_level_macro {
  ($name:ident, $method:literal) => {
    #[proc_macro]
    pub fn $name(input: TokenStream) -> TokenStream {
      let input = syn::parse_macro_input!(input as LogInput);
      expand(input, $method).into()
    }
  };
}

define_level_macro!(log_debug, "debug");
define_level_macro!(log_info, "info");
define_level_macro!(log_warning, "warning");
define_level_macro!(log_error, "error");
define_level_macro!(log_critical, "critical");
